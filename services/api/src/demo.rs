use crate::infra::demo_hospital;
use chrono::SecondsFormat;
use clap::Args;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use ward_admission::admissions::{
    load_store, AdmissionService, AdmissionStore, AllocationConfig, AssignmentKind,
    AssignmentReceipt, DiagnosisId, DiagnosisStatsReport, DistributionReport, InMemoryAdmissionStore,
    OccupancyReport, Patient, PatientId, WardId,
};
use ward_admission::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct DistributeArgs {
    /// Ward CSV: id,name,max_capacity,preferred_diagnosis_id
    #[arg(long)]
    pub(crate) wards: PathBuf,
    /// Patient CSV: id,first_name,last_name,father_name,diagnosis_id,ward_id
    #[arg(long)]
    pub(crate) patients: Option<PathBuf>,
    /// Print the distribution and occupancy reports as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the explicit move and discharge after the batch run.
    #[arg(long)]
    pub(crate) skip_moves: bool,
}

pub(crate) fn run_distribution(args: DistributeArgs) -> Result<(), AppError> {
    let DistributeArgs {
        wards,
        patients,
        json,
    } = args;

    let (store, _) = load_store(wards, patients)?;
    let names = patient_names(&store)?;
    let service = AdmissionService::new(Arc::new(store), AllocationConfig::default());

    let report = service.distribute_all()?;
    let occupancy = service.occupancy_report()?;

    if json {
        let payload = json!({ "distribution": report, "occupancy": occupancy });
        let rendered = serde_json::to_string_pretty(&payload).map_err(std::io::Error::from)?;
        println!("{rendered}");
    } else {
        render_distribution(&report, &names);
        render_occupancy(&occupancy);
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let hospital = demo_hospital()?;
    let pending = roster(&hospital.store)?;
    let names = patient_names(&hospital.store)?;
    let service = AdmissionService::new(hospital.store.clone(), AllocationConfig::default());

    println!("Ward admission demo");
    render_occupancy(&service.occupancy_report()?);

    println!("\nPatients waiting for a bed");
    for patient in pending.iter().filter(|patient| !patient.is_assigned()) {
        println!(
            "- #{} {} ({})",
            patient.id,
            patient.full_name(),
            hospital.diagnosis_name(patient.diagnosis_id)
        );
    }

    let first = PatientId(2);
    let preview = service.suggest_ward(first)?;
    println!("\nSuggestion for #{first}: {}", preview.summary());
    let placement = service.admit(first)?;
    render_receipt(&placement.receipt, &names);

    let report = service.distribute_all()?;
    render_distribution(&report, &names);

    if !args.skip_moves {
        println!("\nManual adjustments");
        let moved = service.commit_assignment(PatientId(3), WardId(3))?;
        render_receipt(&moved, &names);
        if let Some(ward_id) = service.discharge(PatientId(1))? {
            println!(
                "- #1 {} discharged from ward {ward_id}",
                name_of(&names, PatientId(1))
            );
        }
    }

    render_occupancy(&service.occupancy_report()?);
    render_diagnosis_stats(&service.diagnosis_stats()?, |id| {
        hospital.diagnosis_name(id).to_string()
    });
    Ok(())
}

fn roster(store: &InMemoryAdmissionStore) -> Result<Vec<Patient>, AppError> {
    store
        .list_patients()
        .map_err(|err| AppError::Admission(err.into()))
}

fn patient_names(
    store: &InMemoryAdmissionStore,
) -> Result<BTreeMap<PatientId, String>, AppError> {
    Ok(roster(store)?
        .into_iter()
        .map(|patient| (patient.id, patient.full_name()))
        .collect())
}

fn name_of(names: &BTreeMap<PatientId, String>, id: PatientId) -> &str {
    names.get(&id).map(String::as_str).unwrap_or("unknown patient")
}

fn render_receipt(receipt: &AssignmentReceipt, names: &BTreeMap<PatientId, String>) {
    let action = match receipt.kind {
        AssignmentKind::Admitted => "admitted to".to_string(),
        AssignmentKind::Moved { from } => format!("moved from ward {from} to"),
        AssignmentKind::Unchanged => "already in".to_string(),
    };
    println!(
        "- #{} {} {} ward {} (now {} occupied)",
        receipt.patient_id,
        name_of(names, receipt.patient_id),
        action,
        receipt.ward_id,
        receipt.ward_occupancy
    );
}

fn render_distribution(report: &DistributionReport, names: &BTreeMap<PatientId, String>) {
    println!(
        "\nDistribution run {} -> {}",
        report.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        report.finished_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    println!("{}", report.summary());

    for assigned in &report.assigned {
        println!(
            "- #{} {} -> ward {} ({})",
            assigned.patient_id,
            name_of(names, assigned.patient_id),
            assigned.ward_id,
            assigned.rule.label()
        );
    }

    if !report.failed.is_empty() {
        println!("Left unassigned");
        for failed in &report.failed {
            println!(
                "- #{} {}: {}",
                failed.patient_id,
                name_of(names, failed.patient_id),
                failed.reason.summary()
            );
        }
    }
}

fn render_occupancy(report: &OccupancyReport) {
    println!(
        "\nOccupancy: {}/{} beds ({}%), {} of {} patient(s) unassigned",
        report.total_occupancy,
        report.total_capacity,
        report.occupancy_percent(),
        report.unassigned_patients,
        report.total_patients
    );
    for ward in &report.wards {
        let tag = ward
            .preferred_diagnosis
            .map(|diagnosis| format!(", prefers diagnosis {diagnosis}"))
            .unwrap_or_default();
        println!(
            "- ward {} {}: {}/{} ({}%){}",
            ward.ward_id,
            ward.name,
            ward.current_occupancy,
            ward.max_capacity,
            ward.occupancy_percent,
            tag
        );
    }
}

fn render_diagnosis_stats<F>(report: &DiagnosisStatsReport, name_of: F)
where
    F: Fn(DiagnosisId) -> String,
{
    println!("\nPatients by diagnosis ({} total)", report.total_patients);
    for entry in &report.diagnoses {
        println!(
            "- {}: {} ({:.1}%)",
            name_of(entry.diagnosis_id),
            entry.patients,
            entry.percent
        );
    }
}
