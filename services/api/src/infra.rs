use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use ward_admission::admissions::{
    import_into, load_store, Diagnosis, DiagnosisId, InMemoryAdmissionStore,
    Patient, PatientId, SeedPatient, Ward, WardId,
};
use ward_admission::config::SeedConfig;
use ward_admission::error::AppError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Store backing the HTTP service: seeded from CSV when configured, empty otherwise.
pub(crate) fn seeded_store(seed: &SeedConfig) -> Result<InMemoryAdmissionStore, AppError> {
    let Some(wards_csv) = seed.wards_csv.as_ref() else {
        info!("no ward seed configured, starting with an empty store");
        return Ok(InMemoryAdmissionStore::new());
    };

    let (store, summary) = load_store(wards_csv, seed.patients_csv.as_ref())?;
    info!(
        wards = summary.wards,
        patients = summary.patients,
        placed = summary.placed,
        "admission store seeded"
    );
    Ok(store)
}

/// Reference data for the built-in demo.
pub(crate) struct DemoHospital {
    pub(crate) diagnoses: Vec<Diagnosis>,
    pub(crate) store: Arc<InMemoryAdmissionStore>,
}

impl DemoHospital {
    pub(crate) fn diagnosis_name(&self, id: DiagnosisId) -> &str {
        self.diagnoses
            .iter()
            .find(|diagnosis| diagnosis.id == id)
            .map(|diagnosis| diagnosis.name.as_str())
            .unwrap_or("unclassified")
    }
}

pub(crate) fn demo_hospital() -> Result<DemoHospital, AppError> {
    let diagnoses = vec![
        Diagnosis {
            id: DiagnosisId(1),
            name: "Myocardial infarction".to_string(),
        },
        Diagnosis {
            id: DiagnosisId(2),
            name: "Pneumonia".to_string(),
        },
        Diagnosis {
            id: DiagnosisId(3),
            name: "Fractured femur".to_string(),
        },
    ];

    let wards = vec![
        Ward::new(WardId(1), "Cardiology", 2, Some(DiagnosisId(1)))?,
        Ward::new(WardId(2), "Pulmonology", 3, Some(DiagnosisId(2)))?,
        Ward::new(WardId(3), "General Medicine", 4, None)?,
        Ward::new(WardId(4), "Overflow", 1, None)?,
    ];

    let people = [
        (1, "Anna", "Kowalska", Some("Jan"), 1, Some(1)),
        (2, "Boris", "Ivanov", Some("Pavel"), 1, None),
        (3, "Clara", "Meyer", None, 1, None),
        (4, "Dmitri", "Sokolov", Some("Oleg"), 2, None),
        (5, "Eva", "Novak", None, 2, None),
        (6, "Filip", "Horvat", None, 3, Some(3)),
        (7, "Greta", "Lind", None, 3, None),
        (8, "Hugo", "Marchetti", Some("Luca"), 1, None),
    ];

    let mut seeds = Vec::with_capacity(people.len());
    for (id, first, last, father, diagnosis, ward) in people {
        let patient = Patient::new(
            PatientId(id),
            first,
            last,
            father.map(str::to_string),
            DiagnosisId(diagnosis),
        )?;
        seeds.push(SeedPatient {
            patient,
            ward_id: ward.map(WardId),
        });
    }

    let store = InMemoryAdmissionStore::new();
    import_into(&store, wards, seeds)?;

    Ok(DemoHospital {
        diagnoses,
        store: Arc::new(store),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_admission::admissions::AdmissionStore;

    #[test]
    fn empty_seed_config_starts_empty() {
        let store = seeded_store(&SeedConfig::default()).expect("empty store");
        assert!(store.list_wards().expect("wards listed").is_empty());
    }

    #[test]
    fn demo_hospital_seeds_pre_admitted_patients() {
        let hospital = demo_hospital().expect("demo data is valid");
        let cardiology = hospital
            .store
            .fetch_ward(WardId(1))
            .expect("store reachable")
            .expect("cardiology exists");
        assert_eq!(cardiology.current_occupancy, 1);
        assert_eq!(
            hospital
                .store
                .list_unassigned_patients()
                .expect("store reachable")
                .len(),
            6
        );
        assert_eq!(hospital.diagnosis_name(DiagnosisId(2)), "Pneumonia");
        assert_eq!(hospital.diagnosis_name(DiagnosisId(9)), "unclassified");
    }
}
