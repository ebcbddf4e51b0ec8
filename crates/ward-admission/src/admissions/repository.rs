use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Patient, PatientId, Ward, WardId};

/// How a committed assignment changed ward membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// Previously unassigned patient took a bed.
    Admitted,
    /// Patient left `from` and took a bed in the target ward in one step.
    Moved { from: WardId },
    /// Patient already occupied the target ward; nothing changed.
    Unchanged,
}

/// Proof of a committed assignment, as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReceipt {
    pub patient_id: PatientId,
    pub ward_id: WardId,
    pub kind: AssignmentKind,
    /// Target ward occupancy immediately after the commit.
    pub ward_occupancy: u32,
    pub committed_at: DateTime<Utc>,
}

/// Storage collaborator behind the assignment transaction.
///
/// `apply_assignment` and `release` are the only operations allowed to change a ward's
/// occupancy counter or a patient's ward, and each must run as one isolated unit of work:
/// the patient's current ward is compared with `previous_ward_id`, the target capacity is
/// re-checked against current truth, and every counter and link changes together or not at
/// all. Commits against the same ward must be serialized.
pub trait AdmissionStore: Send + Sync {
    fn list_wards(&self) -> Result<Vec<Ward>, StoreError>;
    fn list_patients(&self) -> Result<Vec<Patient>, StoreError>;
    fn list_unassigned_patients(&self) -> Result<Vec<Patient>, StoreError>;
    fn fetch_patient(&self, id: PatientId) -> Result<Option<Patient>, StoreError>;
    fn fetch_ward(&self, id: WardId) -> Result<Option<Ward>, StoreError>;
    fn patients_in_ward(&self, id: WardId) -> Result<Vec<Patient>, StoreError>;
    fn apply_assignment(
        &self,
        patient_id: PatientId,
        ward_id: WardId,
        previous_ward_id: Option<WardId>,
    ) -> Result<AssignmentReceipt, StoreError>;
    /// Clear the patient's ward and free the bed. Returns the ward that was released, if any.
    fn release(
        &self,
        patient_id: PatientId,
        previous_ward_id: Option<WardId>,
    ) -> Result<Option<WardId>, StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("patient {0} not found")]
    PatientNotFound(PatientId),
    #[error("ward {0} not found")]
    WardNotFound(WardId),
    #[error("ward {0} is at capacity")]
    CapacityExceeded(WardId),
    #[error("patient ward changed concurrently (now {actual:?})")]
    StaleAssignment { actual: Option<WardId> },
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
