use chrono::Utc;
use tracing::{debug, info, warn};

use super::domain::{Patient, PatientAllocationState, PatientId, WardId};
use super::error::AdmissionError;
use super::policy::{select_ward, WardSelection};
use super::report::{AssignedPatient, DistributionReport, FailedPatient, FailureReason};
use super::repository::{AdmissionStore, AssignmentReceipt, StoreError};
use super::snapshot::WardSnapshot;

/// Outcome of placing one unassigned patient.
#[derive(Debug, Clone)]
pub struct Placement {
    pub selection: WardSelection,
    pub receipt: AssignmentReceipt,
    /// Set when the first commit lost a capacity race and the policy re-ran on fresh state.
    pub refreshed: Option<WardSnapshot>,
}

/// Runs the allocation policy and the assignment transaction for unassigned patients.
pub struct BatchDistributor<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> BatchDistributor<'a, S>
where
    S: AdmissionStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Place every patient in ascending id order, carrying a working snapshot forward so
    /// earlier placements in the run are visible to later decisions.
    ///
    /// Per-patient failures land in the report; they never stop the run.
    pub fn distribute(&self, patients: Vec<Patient>, snapshot: WardSnapshot) -> DistributionReport {
        let started_at = Utc::now();
        let mut patients = patients;
        patients.sort_by_key(|patient| patient.id);
        patients.dedup_by_key(|patient| patient.id);

        let mut working = snapshot;
        let mut assigned = Vec::new();
        let mut failed = Vec::new();

        for patient in &patients {
            let mut state = PatientAllocationState::Unassigned;

            if let Some(ward_id) = patient.ward_id {
                state = step(patient.id, state, PatientAllocationState::Failed);
                debug!(
                    patient_id = %patient.id,
                    %ward_id,
                    state = state.label(),
                    "skipping patient already placed"
                );
                failed.push(FailedPatient {
                    patient_id: patient.id,
                    reason: FailureReason::AlreadyAssigned { ward_id },
                });
                continue;
            }

            let selection = match select_ward(patient, &working) {
                Ok(selection) => selection,
                Err(err) => {
                    state = step(patient.id, state, PatientAllocationState::Failed);
                    debug!(patient_id = %patient.id, state = state.label(), "no ward available");
                    failed.push(FailedPatient {
                        patient_id: patient.id,
                        reason: FailureReason::from(&AdmissionError::from(err)),
                    });
                    continue;
                }
            };
            state = step(patient.id, state, PatientAllocationState::PolicySelected);

            let attempt = self.commit_selection(patient, selection);
            let mut base = attempt.refreshed.unwrap_or(working);
            match attempt.outcome {
                Ok((selection, receipt)) => {
                    state = step(patient.id, state, PatientAllocationState::Committed);
                    let ward_id = receipt.ward_id;
                    working = match base.with_admission(ward_id) {
                        Ok(next) => next,
                        Err(err) => {
                            warn!(
                                patient_id = %patient.id,
                                %ward_id,
                                error = %err,
                                "working snapshot disagrees with committed state"
                            );
                            base
                        }
                    };
                    debug!(
                        patient_id = %patient.id,
                        %ward_id,
                        rule = selection.rule.label(),
                        state = state.label(),
                        "patient placed"
                    );
                    assigned.push(AssignedPatient {
                        patient_id: patient.id,
                        ward_id,
                        rule: selection.rule,
                    });
                }
                Err(err) => {
                    state = step(patient.id, state, PatientAllocationState::Failed);
                    if let AdmissionError::WardNotFound { ward_id } = &err {
                        let ward_id = *ward_id;
                        debug!(%ward_id, "ward no longer exists; dropped from working snapshot");
                        base = base.without(ward_id);
                    }
                    working = base;
                    debug!(
                        patient_id = %patient.id,
                        error = %err,
                        state = state.label(),
                        "placement failed"
                    );
                    failed.push(FailedPatient {
                        patient_id: patient.id,
                        reason: FailureReason::from(&err),
                    });
                }
            }
        }

        let report = DistributionReport {
            started_at,
            finished_at: Utc::now(),
            assigned,
            failed,
        };
        info!(
            assigned = report.assigned.len(),
            failed = report.failed.len(),
            "distribution run finished"
        );
        report
    }

    /// Select and commit a ward for one unassigned patient against `snapshot`.
    pub fn place(
        &self,
        patient: &Patient,
        snapshot: &WardSnapshot,
    ) -> Result<Placement, AdmissionError> {
        if let Some(ward_id) = patient.ward_id {
            return Err(AdmissionError::AlreadyAssigned {
                patient_id: patient.id,
                ward_id,
            });
        }
        let selection = select_ward(patient, snapshot)?;
        let attempt = self.commit_selection(patient, selection);
        let refreshed = attempt.refreshed;
        attempt.outcome.map(|(selection, receipt)| Placement {
            selection,
            receipt,
            refreshed,
        })
    }

    /// Commit `selection`, retrying once on a refreshed snapshot if the ward filled up first.
    ///
    /// The refreshed snapshot is handed back on failure too, so a batch run can carry it forward.
    fn commit_selection(&self, patient: &Patient, selection: WardSelection) -> CommitAttempt {
        let first = match self.commit_unassigned(patient.id, selection.ward_id) {
            Ok(receipt) => return CommitAttempt::settled(Ok((selection, receipt))),
            Err(err) => err,
        };
        if !first.is_retryable() {
            return CommitAttempt::settled(Err(first));
        }

        debug!(
            patient_id = %patient.id,
            ward_id = %selection.ward_id,
            "ward filled before commit; retrying on a refreshed snapshot"
        );
        let refreshed = match self
            .store
            .list_wards()
            .map_err(AdmissionError::from)
            .and_then(WardSnapshot::from_wards)
        {
            Ok(refreshed) => refreshed,
            Err(err) => return CommitAttempt::settled(Err(err)),
        };

        let outcome = select_ward(patient, &refreshed)
            .map_err(AdmissionError::from)
            .and_then(|retry| {
                self.commit_unassigned(patient.id, retry.ward_id)
                    .map(|receipt| (retry, receipt))
            });
        CommitAttempt {
            outcome,
            refreshed: Some(refreshed),
        }
    }

    fn commit_unassigned(
        &self,
        patient_id: PatientId,
        ward_id: WardId,
    ) -> Result<AssignmentReceipt, AdmissionError> {
        match self.store.apply_assignment(patient_id, ward_id, None) {
            Ok(receipt) => Ok(receipt),
            Err(StoreError::StaleAssignment {
                actual: Some(current),
            }) => Err(AdmissionError::AlreadyAssigned {
                patient_id,
                ward_id: current,
            }),
            Err(err) => Err(err.into()),
        }
    }
}

/// Result of one commit plus whatever ward state was re-read while producing it.
struct CommitAttempt {
    outcome: Result<(WardSelection, AssignmentReceipt), AdmissionError>,
    refreshed: Option<WardSnapshot>,
}

impl CommitAttempt {
    fn settled(outcome: Result<(WardSelection, AssignmentReceipt), AdmissionError>) -> Self {
        Self {
            outcome,
            refreshed: None,
        }
    }
}

fn step(
    patient_id: PatientId,
    current: PatientAllocationState,
    next: PatientAllocationState,
) -> PatientAllocationState {
    current.advance(next).unwrap_or_else(|| {
        warn!(
            %patient_id,
            from = current.label(),
            to = next.label(),
            "unexpected allocation state transition"
        );
        next
    })
}
