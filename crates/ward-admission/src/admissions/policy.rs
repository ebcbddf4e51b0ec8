use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::domain::{Patient, PatientId, Ward, WardId};
use super::snapshot::WardSnapshot;

/// Which allocation rule produced a selection, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationRule {
    /// Ward tagged with the patient's diagnosis and a free bed.
    DiagnosisMatch,
    /// Completely empty ward.
    EmptyWard,
    /// Lowest occupancy ratio among wards with a free bed.
    LowestOccupancy,
}

impl AllocationRule {
    pub const fn label(self) -> &'static str {
        match self {
            AllocationRule::DiagnosisMatch => "diagnosis_match",
            AllocationRule::EmptyWard => "empty_ward",
            AllocationRule::LowestOccupancy => "lowest_occupancy",
        }
    }
}

/// Candidate ward chosen by the policy. Advisory until committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardSelection {
    pub ward_id: WardId,
    pub rule: AllocationRule,
}

impl WardSelection {
    pub fn summary(&self) -> String {
        match self.rule {
            AllocationRule::DiagnosisMatch => {
                format!("ward {} matches the patient's diagnosis", self.ward_id)
            }
            AllocationRule::EmptyWard => format!("ward {} is empty", self.ward_id),
            AllocationRule::LowestOccupancy => {
                format!("ward {} has the lowest occupancy ratio", self.ward_id)
            }
        }
    }
}

/// No ward in the snapshot has a free bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("no ward available for patient {patient_id}")]
pub struct NoWardAvailable {
    pub patient_id: PatientId,
}

/// Choose a ward for `patient` from `wards`. Pure: the snapshot is only read.
///
/// Rules are tried in order and the first one that matches wins:
/// 1. a ward tagged with the patient's diagnosis that still has a free bed,
/// 2. any completely empty ward,
/// 3. the ward with the lowest `occupancy / capacity` among wards with a free bed.
///
/// Ties inside a rule go to the lowest ward id.
pub fn select_ward(
    patient: &Patient,
    wards: &WardSnapshot,
) -> Result<WardSelection, NoWardAvailable> {
    if let Some(ward) = wards
        .available()
        .find(|ward| ward.is_tagged_for(patient.diagnosis_id))
    {
        return Ok(WardSelection {
            ward_id: ward.id,
            rule: AllocationRule::DiagnosisMatch,
        });
    }

    if let Some(ward) = wards.available().find(|ward| ward.is_empty()) {
        return Ok(WardSelection {
            ward_id: ward.id,
            rule: AllocationRule::EmptyWard,
        });
    }

    let mut best: Option<&Ward> = None;
    for ward in wards.available() {
        best = match best {
            Some(current) if compare_load(ward, current) != Ordering::Less => Some(current),
            _ => Some(ward),
        };
    }

    best.map(|ward| WardSelection {
        ward_id: ward.id,
        rule: AllocationRule::LowestOccupancy,
    })
    .ok_or(NoWardAvailable {
        patient_id: patient.id,
    })
}

/// Compare occupancy ratios exactly: a/b against c/d as a*d against c*b.
fn compare_load(left: &Ward, right: &Ward) -> Ordering {
    let left_load = u64::from(left.current_occupancy) * u64::from(right.max_capacity);
    let right_load = u64::from(right.current_occupancy) * u64::from(left.max_capacity);
    left_load.cmp(&right_load)
}
