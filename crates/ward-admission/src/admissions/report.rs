use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{DiagnosisId, Patient, PatientAllocationState, PatientId, WardId};
use super::error::AdmissionError;
use super::policy::AllocationRule;
use super::snapshot::WardSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedPatient {
    pub patient_id: PatientId,
    pub ward_id: WardId,
    pub rule: AllocationRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPatient {
    pub patient_id: PatientId,
    pub reason: FailureReason,
}

/// Why a patient stayed unassigned in a distribution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    NoWardAvailable,
    CapacityExceeded { ward_id: WardId },
    NotFound { detail: String },
    AlreadyAssigned { ward_id: WardId },
    Invalid { detail: String },
    Storage { detail: String },
}

impl FailureReason {
    pub fn summary(&self) -> String {
        match self {
            FailureReason::NoWardAvailable => "no ward has a free bed".to_string(),
            FailureReason::CapacityExceeded { ward_id } => {
                format!("ward {ward_id} filled up before the assignment committed")
            }
            FailureReason::NotFound { detail } => format!("not found: {detail}"),
            FailureReason::AlreadyAssigned { ward_id } => {
                format!("already assigned to ward {ward_id}")
            }
            FailureReason::Invalid { detail } => format!("invalid: {detail}"),
            FailureReason::Storage { detail } => format!("storage error: {detail}"),
        }
    }
}

impl From<&AdmissionError> for FailureReason {
    fn from(value: &AdmissionError) -> Self {
        match value {
            AdmissionError::NoWardAvailable(_) => FailureReason::NoWardAvailable,
            AdmissionError::CapacityExceeded { ward_id } => FailureReason::CapacityExceeded {
                ward_id: *ward_id,
            },
            AdmissionError::PatientNotFound { .. } | AdmissionError::WardNotFound { .. } => {
                FailureReason::NotFound {
                    detail: value.to_string(),
                }
            }
            AdmissionError::AlreadyAssigned { ward_id, .. } => FailureReason::AlreadyAssigned {
                ward_id: *ward_id,
            },
            AdmissionError::Validation(detail) => FailureReason::Invalid {
                detail: detail.clone(),
            },
            AdmissionError::Storage(detail) => FailureReason::Storage {
                detail: detail.clone(),
            },
        }
    }
}

/// Result of one batch distribution run. Partial success is a normal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub assigned: Vec<AssignedPatient>,
    pub failed: Vec<FailedPatient>,
}

impl DistributionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.assigned.len() + self.failed.len()
    }

    /// Terminal state `patient_id` reached in this run, `Unassigned` if it was not part of it.
    pub fn state_of(&self, patient_id: PatientId) -> PatientAllocationState {
        if self
            .assigned
            .iter()
            .any(|entry| entry.patient_id == patient_id)
        {
            PatientAllocationState::Committed
        } else if self.failed.iter().any(|entry| entry.patient_id == patient_id) {
            PatientAllocationState::Failed
        } else {
            PatientAllocationState::Unassigned
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} patient(s) assigned, {} failed",
            self.assigned.len(),
            self.processed(),
            self.failed.len()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardOccupancyView {
    pub ward_id: WardId,
    pub name: String,
    pub max_capacity: u32,
    pub current_occupancy: u32,
    pub available_beds: u32,
    pub occupancy_percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_diagnosis: Option<DiagnosisId>,
}

/// Hospital-wide bed usage at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyReport {
    pub generated_at: DateTime<Utc>,
    pub wards: Vec<WardOccupancyView>,
    pub total_capacity: u32,
    pub total_occupancy: u32,
    pub total_patients: usize,
    pub unassigned_patients: usize,
}

impl OccupancyReport {
    pub fn build(snapshot: &WardSnapshot, patients: &[Patient]) -> Self {
        let wards = snapshot
            .iter()
            .map(|ward| WardOccupancyView {
                ward_id: ward.id,
                name: ward.name.clone(),
                max_capacity: ward.max_capacity,
                current_occupancy: ward.current_occupancy,
                available_beds: ward.available_beds(),
                occupancy_percent: ward.occupancy_percent(),
                preferred_diagnosis: ward.preferred_diagnosis,
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            wards,
            total_capacity: snapshot.total_capacity(),
            total_occupancy: snapshot.total_occupancy(),
            total_patients: patients.len(),
            unassigned_patients: patients
                .iter()
                .filter(|patient| patient.ward_id.is_none())
                .count(),
        }
    }

    pub fn occupancy_percent(&self) -> u32 {
        if self.total_capacity == 0 {
            return 0;
        }
        self.total_occupancy * 100 / self.total_capacity
    }
}

/// Patient counts per diagnosis, for every diagnosis at least one patient carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisStatsReport {
    pub generated_at: DateTime<Utc>,
    pub total_patients: usize,
    /// Ascending diagnosis id.
    pub diagnoses: Vec<DiagnosisCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisCount {
    pub diagnosis_id: DiagnosisId,
    pub patients: usize,
    /// Share of all patients, rounded to one decimal place.
    pub percent: f64,
}

impl DiagnosisStatsReport {
    pub fn build(patients: &[Patient]) -> Self {
        let mut counts: BTreeMap<DiagnosisId, usize> = BTreeMap::new();
        for patient in patients {
            *counts.entry(patient.diagnosis_id).or_default() += 1;
        }

        let total_patients = patients.len();
        let diagnoses = counts
            .into_iter()
            .map(|(diagnosis_id, count)| DiagnosisCount {
                diagnosis_id,
                patients: count,
                percent: share_percent(count, total_patients),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            total_patients,
            diagnoses,
        }
    }

    pub fn count_for(&self, diagnosis_id: DiagnosisId) -> usize {
        self.diagnoses
            .iter()
            .find(|entry| entry.diagnosis_id == diagnosis_id)
            .map_or(0, |entry| entry.patients)
    }
}

fn share_percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 1000.0 / total as f64).round() / 10.0
}
