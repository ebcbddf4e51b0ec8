//! Ward admission allocation engine.
//!
//! Decision and commit are kept apart: [`select_ward`] is a pure function over a
//! [`WardSnapshot`], while every change to occupancy or ward membership goes through the
//! [`AdmissionStore`] transaction, which re-checks capacity against current truth. Snapshots
//! are advisory and may be stale; the store is authoritative.
//!
//! Diagnosis tags on wards are a soft preference, not isolation. A tagged ward still takes
//! patients with other diagnoses once the policy falls through to its empty-ward or
//! load-balancing rules.

pub mod config;
pub mod distributor;
pub mod domain;
pub mod error;
pub mod import;
pub mod policy;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod tests;

pub use config::AllocationConfig;
pub use distributor::{BatchDistributor, Placement};
pub use domain::{
    Diagnosis, DiagnosisId, Patient, PatientAllocationState, PatientId, Ward, WardId,
};
pub use error::AdmissionError;
pub use import::{
    import_into, load_store, read_patients, read_wards, ImportError, ImportSummary, SeedPatient,
};
pub use policy::{select_ward, AllocationRule, NoWardAvailable, WardSelection};
pub use report::{
    AssignedPatient, DiagnosisCount, DiagnosisStatsReport, DistributionReport, FailedPatient,
    FailureReason, OccupancyReport, WardOccupancyView,
};
pub use repository::{AdmissionStore, AssignmentKind, AssignmentReceipt, StoreError};
pub use router::{admission_router, status_for, AssignWardRequest, WardSuggestionView};
pub use service::AdmissionService;
pub use snapshot::WardSnapshot;
pub use store::InMemoryAdmissionStore;
