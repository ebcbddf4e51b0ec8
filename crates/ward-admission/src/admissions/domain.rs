use std::fmt;

use serde::{Deserialize, Serialize};

use super::AdmissionError;

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 50;
const WARD_MAX_CAPACITY: u32 = 100;

fn capacity_in_range(max_capacity: u32) -> bool {
    (1..=WARD_MAX_CAPACITY).contains(&max_capacity)
}

/// Identifier wrapper for wards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WardId(pub u32);

/// Identifier wrapper for patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub u32);

/// Identifier wrapper for diagnoses. The engine only compares these, it never resolves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagnosisId(pub u32);

impl fmt::Display for WardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DiagnosisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bed-capacity-limited unit that patients are admitted to.
///
/// `preferred_diagnosis` is a soft tag: wards tagged for one diagnosis still accept other
/// patients when the allocation policy falls through to its empty-ward or load-balancing rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub id: WardId,
    pub name: String,
    pub max_capacity: u32,
    pub current_occupancy: u32,
    #[serde(default)]
    pub preferred_diagnosis: Option<DiagnosisId>,
}

impl Ward {
    /// Build an empty ward, validating the same limits the records system enforces on intake.
    pub fn new(
        id: WardId,
        name: impl Into<String>,
        max_capacity: u32,
        preferred_diagnosis: Option<DiagnosisId>,
    ) -> Result<Self, AdmissionError> {
        if id.0 == 0 {
            return Err(AdmissionError::Validation(
                "ward id must be positive".to_string(),
            ));
        }

        let name = validate_name("ward name", name.into())?;

        if !capacity_in_range(max_capacity) {
            return Err(AdmissionError::Validation(format!(
                "ward {id} capacity must be between 1 and {WARD_MAX_CAPACITY}, got {max_capacity}"
            )));
        }

        Ok(Self {
            id,
            name,
            max_capacity,
            current_occupancy: 0,
            preferred_diagnosis,
        })
    }

    /// False for wards assembled by hand with a bed count outside `1..=100`.
    pub fn has_valid_capacity(&self) -> bool {
        capacity_in_range(self.max_capacity)
    }

    pub fn has_free_bed(&self) -> bool {
        self.current_occupancy < self.max_capacity
    }

    pub fn is_empty(&self) -> bool {
        self.current_occupancy == 0
    }

    pub fn available_beds(&self) -> u32 {
        self.max_capacity.saturating_sub(self.current_occupancy)
    }

    /// Integer occupancy percentage, rounded down.
    pub fn occupancy_percent(&self) -> u32 {
        if self.max_capacity == 0 {
            return 0;
        }
        self.current_occupancy * 100 / self.max_capacity
    }

    pub fn is_tagged_for(&self, diagnosis: DiagnosisId) -> bool {
        self.preferred_diagnosis == Some(diagnosis)
    }
}

/// Patient record as far as the allocation engine is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    pub diagnosis_id: DiagnosisId,
    #[serde(default)]
    pub ward_id: Option<WardId>,
}

impl Patient {
    /// Build a new, unassigned patient.
    pub fn new(
        id: PatientId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        father_name: Option<String>,
        diagnosis_id: DiagnosisId,
    ) -> Result<Self, AdmissionError> {
        if id.0 == 0 {
            return Err(AdmissionError::Validation(
                "patient id must be positive".to_string(),
            ));
        }
        if diagnosis_id.0 == 0 {
            return Err(AdmissionError::Validation(format!(
                "patient {id} must reference a diagnosis"
            )));
        }

        let first_name = validate_name("first name", first_name.into())?;
        let last_name = validate_name("last name", last_name.into())?;
        let father_name = match father_name {
            Some(value) if !value.trim().is_empty() => {
                Some(validate_name("father name", value)?)
            }
            _ => None,
        };

        Ok(Self {
            id,
            first_name,
            last_name,
            father_name,
            diagnosis_id,
            ward_id: None,
        })
    }

    pub fn full_name(&self) -> String {
        match &self.father_name {
            Some(father) => format!("{} {} {}", self.first_name, father, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.ward_id.is_some()
    }
}

/// Diagnosis reference data. Read, never mutated, by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: DiagnosisId,
    pub name: String,
}

/// Per-patient progress through one distribution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientAllocationState {
    Unassigned,
    PolicySelected,
    Committed,
    Failed,
}

impl PatientAllocationState {
    pub const fn label(self) -> &'static str {
        match self {
            PatientAllocationState::Unassigned => "unassigned",
            PatientAllocationState::PolicySelected => "policy_selected",
            PatientAllocationState::Committed => "committed",
            PatientAllocationState::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            PatientAllocationState::Committed | PatientAllocationState::Failed
        )
    }

    /// Advance the state machine; terminal states and skipped steps are rejected.
    pub fn advance(self, next: PatientAllocationState) -> Option<PatientAllocationState> {
        use PatientAllocationState::*;
        match (self, next) {
            (Unassigned, PolicySelected)
            | (Unassigned, Failed)
            | (PolicySelected, Committed)
            | (PolicySelected, Failed) => Some(next),
            _ => None,
        }
    }
}

fn validate_name(field: &str, value: String) -> Result<String, AdmissionError> {
    let trimmed = value.trim();
    let length = trimmed.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&length) {
        return Err(AdmissionError::Validation(format!(
            "{field} must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}
