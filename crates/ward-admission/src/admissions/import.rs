use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use tracing::info;

use super::domain::{DiagnosisId, Patient, PatientId, Ward, WardId};
use super::error::AdmissionError;
use super::repository::{AdmissionStore, StoreError};
use super::store::InMemoryAdmissionStore;

/// Failure while loading ward or patient seed data.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid seed record: {0}")]
    Record(#[from] AdmissionError),
    #[error("could not load seed record into store: {0}")]
    Store(#[from] StoreError),
}

/// Patient row plus the ward it should already occupy, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPatient {
    pub patient: Patient,
    pub ward_id: Option<WardId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub wards: usize,
    pub patients: usize,
    pub placed: usize,
}

#[derive(Debug, Deserialize)]
struct WardCsvRow {
    id: u32,
    name: String,
    max_capacity: u32,
    #[serde(default)]
    preferred_diagnosis_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PatientCsvRow {
    id: u32,
    first_name: String,
    last_name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    father_name: Option<String>,
    diagnosis_id: u32,
    #[serde(default)]
    ward_id: Option<u32>,
}

pub fn read_wards<R: Read>(reader: R) -> Result<Vec<Ward>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut wards = Vec::new();

    for record in csv_reader.deserialize::<WardCsvRow>() {
        let row = record?;
        wards.push(Ward::new(
            WardId(row.id),
            row.name,
            row.max_capacity,
            row.preferred_diagnosis_id.map(DiagnosisId),
        )?);
    }

    Ok(wards)
}

pub fn read_patients<R: Read>(reader: R) -> Result<Vec<SeedPatient>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut patients = Vec::new();

    for record in csv_reader.deserialize::<PatientCsvRow>() {
        let row = record?;
        let patient = Patient::new(
            PatientId(row.id),
            row.first_name,
            row.last_name,
            row.father_name,
            DiagnosisId(row.diagnosis_id),
        )?;
        patients.push(SeedPatient {
            patient,
            ward_id: row.ward_id.map(WardId),
        });
    }

    Ok(patients)
}

/// Load wards and patients into `store`.
///
/// Pre-assigned patients are committed through the store one by one, so ward occupancy is
/// derived from membership and a seed file that overfills a ward is rejected.
pub fn import_into(
    store: &InMemoryAdmissionStore,
    wards: Vec<Ward>,
    patients: Vec<SeedPatient>,
) -> Result<ImportSummary, ImportError> {
    let ward_count = wards.len();
    for ward in wards {
        store.insert_ward(ward)?;
    }

    let patient_count = patients.len();
    let mut placed = 0;
    for seed in patients {
        let patient_id = seed.patient.id;
        store.insert_patient(seed.patient)?;
        if let Some(ward_id) = seed.ward_id {
            store.apply_assignment(patient_id, ward_id, None)?;
            placed += 1;
        }
    }

    info!(
        wards = ward_count,
        patients = patient_count,
        placed,
        "seed data imported"
    );

    Ok(ImportSummary {
        wards: ward_count,
        patients: patient_count,
        placed,
    })
}

/// Build a store from seed files on disk. Patients are optional.
pub fn load_store<P: AsRef<Path>>(
    wards_path: P,
    patients_path: Option<P>,
) -> Result<(InMemoryAdmissionStore, ImportSummary), ImportError> {
    let wards = read_wards(File::open(wards_path)?)?;
    let patients = match patients_path {
        Some(path) => read_patients(File::open(path)?)?,
        None => Vec::new(),
    };

    let store = InMemoryAdmissionStore::new();
    let summary = import_into(&store, wards, patients)?;
    Ok((store, summary))
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
