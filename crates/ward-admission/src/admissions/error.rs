use super::domain::{PatientId, WardId};
use super::policy::NoWardAvailable;
use super::repository::StoreError;

/// Failures surfaced by the admission engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// Missing or malformed patient/ward reference. Never retried by the engine.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Ward full at commit time, even if the snapshot said otherwise.
    #[error("ward {ward_id} has reached maximum capacity")]
    CapacityExceeded { ward_id: WardId },
    #[error("patient {patient_id} not found")]
    PatientNotFound { patient_id: PatientId },
    #[error("ward {ward_id} not found")]
    WardNotFound { ward_id: WardId },
    #[error("patient {patient_id} is already assigned to ward {ward_id}")]
    AlreadyAssigned {
        patient_id: PatientId,
        ward_id: WardId,
    },
    #[error(transparent)]
    NoWardAvailable(#[from] NoWardAvailable),
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl AdmissionError {
    /// Only capacity races are worth retrying against a fresh snapshot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdmissionError::CapacityExceeded { .. })
    }
}

impl From<StoreError> for AdmissionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::PatientNotFound(patient_id) => Self::PatientNotFound { patient_id },
            StoreError::WardNotFound(ward_id) => Self::WardNotFound { ward_id },
            StoreError::CapacityExceeded(ward_id) => Self::CapacityExceeded { ward_id },
            StoreError::Conflict(detail) => Self::Validation(detail),
            stale @ StoreError::StaleAssignment { .. } => Self::Storage(stale.to_string()),
            StoreError::Unavailable(detail) => Self::Storage(detail),
        }
    }
}
