use std::sync::Arc;

use tracing::{debug, info};

use super::config::AllocationConfig;
use super::distributor::{BatchDistributor, Placement};
use super::domain::{Patient, PatientId, Ward, WardId};
use super::error::AdmissionError;
use super::policy::{select_ward, WardSelection};
use super::report::{DiagnosisStatsReport, DistributionReport, OccupancyReport};
use super::repository::{AdmissionStore, AssignmentReceipt, StoreError};
use super::snapshot::WardSnapshot;

/// Service composing the allocation policy, the batch distributor, and the storage collaborator.
///
/// Holds no locks of its own; every mutation goes through [`AdmissionStore`], so a failed call
/// can be retried immediately.
pub struct AdmissionService<S> {
    store: Arc<S>,
    config: AllocationConfig,
}

impl<S> AdmissionService<S>
where
    S: AdmissionStore + 'static,
{
    pub fn new(store: Arc<S>, config: AllocationConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current ward state. Advisory only: it can be stale by the time anything commits.
    pub fn snapshot(&self) -> Result<WardSnapshot, AdmissionError> {
        let wards = self.store.list_wards()?;
        WardSnapshot::from_wards(wards)
    }

    pub fn available_wards(&self) -> Result<Vec<Ward>, AdmissionError> {
        Ok(self.snapshot()?.available().cloned().collect())
    }

    pub fn ward_patients(&self, ward_id: WardId) -> Result<Vec<Patient>, AdmissionError> {
        validate_ward_id(ward_id)?;
        Ok(self.store.patients_in_ward(ward_id)?)
    }

    /// Preview which ward the policy would pick for a patient right now. Commits nothing.
    pub fn suggest_ward(&self, patient_id: PatientId) -> Result<WardSelection, AdmissionError> {
        let patient = self.patient(patient_id)?;
        let snapshot = self.snapshot()?;
        Ok(select_ward(&patient, &snapshot)?)
    }

    /// Commit `patient_id` to `ward_id`, moving them if they already occupy another ward.
    ///
    /// Capacity is re-checked by the store at commit time. If another writer changes the
    /// patient's ward between the read and the commit, the cycle is repeated up to
    /// `max_move_attempts` times.
    pub fn commit_assignment(
        &self,
        patient_id: PatientId,
        ward_id: WardId,
    ) -> Result<AssignmentReceipt, AdmissionError> {
        validate_patient_id(patient_id)?;
        validate_ward_id(ward_id)?;

        let attempts = self.config.max_move_attempts.max(1);
        for attempt in 1..=attempts {
            let patient = self.patient(patient_id)?;
            match self
                .store
                .apply_assignment(patient_id, ward_id, patient.ward_id)
            {
                Ok(receipt) => {
                    info!(
                        %patient_id,
                        %ward_id,
                        kind = ?receipt.kind,
                        occupancy = receipt.ward_occupancy,
                        "assignment committed"
                    );
                    return Ok(receipt);
                }
                Err(StoreError::StaleAssignment { actual }) => {
                    debug!(%patient_id, attempt, ?actual, "patient ward changed during commit");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AdmissionError::Storage(format!(
            "patient {patient_id} kept changing wards; gave up after {attempts} attempt(s)"
        )))
    }

    /// Auto-assign one unassigned patient using the allocation policy.
    pub fn admit(&self, patient_id: PatientId) -> Result<Placement, AdmissionError> {
        let patient = self.patient(patient_id)?;
        let snapshot = self.snapshot()?;
        let placement = BatchDistributor::new(self.store.as_ref()).place(&patient, &snapshot)?;
        info!(
            %patient_id,
            ward_id = %placement.receipt.ward_id,
            rule = placement.selection.rule.label(),
            "patient admitted"
        );
        Ok(placement)
    }

    /// Free the patient's bed. Returns the ward that was released, `None` if they had none.
    pub fn discharge(&self, patient_id: PatientId) -> Result<Option<WardId>, AdmissionError> {
        validate_patient_id(patient_id)?;

        let attempts = self.config.max_move_attempts.max(1);
        for attempt in 1..=attempts {
            let patient = self.patient(patient_id)?;
            match self.store.release(patient_id, patient.ward_id) {
                Ok(released) => {
                    if let Some(ward_id) = released {
                        info!(%patient_id, %ward_id, "patient discharged from ward");
                    }
                    return Ok(released);
                }
                Err(StoreError::StaleAssignment { actual }) => {
                    debug!(%patient_id, attempt, ?actual, "patient ward changed during discharge");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AdmissionError::Storage(format!(
            "patient {patient_id} kept changing wards; gave up after {attempts} attempt(s)"
        )))
    }

    /// Distribute every currently unassigned patient.
    ///
    /// Only a failure to read the initial wards or patients aborts the run.
    pub fn distribute_all(&self) -> Result<DistributionReport, AdmissionError> {
        let snapshot = self.snapshot()?;
        let patients = self.store.list_unassigned_patients()?;
        info!(
            patients = patients.len(),
            wards = snapshot.len(),
            "starting distribution run"
        );
        Ok(self.distribute(patients, snapshot))
    }

    /// Distribute the given patients starting from `snapshot`.
    pub fn distribute(&self, patients: Vec<Patient>, snapshot: WardSnapshot) -> DistributionReport {
        BatchDistributor::new(self.store.as_ref()).distribute(patients, snapshot)
    }

    pub fn occupancy_report(&self) -> Result<OccupancyReport, AdmissionError> {
        let snapshot = self.snapshot()?;
        let patients = self.store.list_patients()?;
        Ok(OccupancyReport::build(&snapshot, &patients))
    }

    pub fn diagnosis_stats(&self) -> Result<DiagnosisStatsReport, AdmissionError> {
        let patients = self.store.list_patients()?;
        Ok(DiagnosisStatsReport::build(&patients))
    }

    fn patient(&self, patient_id: PatientId) -> Result<Patient, AdmissionError> {
        validate_patient_id(patient_id)?;
        self.store
            .fetch_patient(patient_id)?
            .ok_or(AdmissionError::PatientNotFound { patient_id })
    }
}

fn validate_patient_id(patient_id: PatientId) -> Result<(), AdmissionError> {
    if patient_id.0 == 0 {
        return Err(AdmissionError::Validation(
            "patient id must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_ward_id(ward_id: WardId) -> Result<(), AdmissionError> {
    if ward_id.0 == 0 {
        return Err(AdmissionError::Validation(
            "ward id must be positive".to_string(),
        ));
    }
    Ok(())
}
