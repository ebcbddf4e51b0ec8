use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;

use super::domain::{Patient, PatientId, Ward, WardId};
use super::repository::{AdmissionStore, AssignmentKind, AssignmentReceipt, StoreError};

/// Reference storage collaborator holding every row in memory.
///
/// Each ward and patient row has its own mutex, so commits touching different wards run in
/// parallel while commits on the same ward queue on that ward's lock. Tables are only
/// write-locked to insert or remove rows, and a removed row is marked retired so a commit
/// that already holds a handle to it fails with not-found instead of resurrecting it.
///
/// Locks are always taken patient row first, then ward rows in ascending id order.
#[derive(Debug, Default)]
pub struct InMemoryAdmissionStore {
    wards: RwLock<BTreeMap<WardId, Arc<Mutex<WardRow>>>>,
    patients: RwLock<BTreeMap<PatientId, Arc<Mutex<PatientRow>>>>,
}

#[derive(Debug)]
struct WardRow {
    ward: Ward,
    retired: bool,
}

#[derive(Debug)]
struct PatientRow {
    patient: Patient,
    retired: bool,
}

impl InMemoryAdmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty ward. Occupancy is only ever derived from assignments.
    pub fn insert_ward(&self, ward: Ward) -> Result<(), StoreError> {
        if !ward.has_valid_capacity() {
            return Err(StoreError::Conflict(format!(
                "ward {} capacity {} is out of range",
                ward.id, ward.max_capacity
            )));
        }
        if ward.current_occupancy != 0 {
            return Err(StoreError::Conflict(format!(
                "ward {} must be registered empty",
                ward.id
            )));
        }
        let mut wards = self.wards.write().map_err(poisoned)?;
        if wards.contains_key(&ward.id) {
            return Err(StoreError::Conflict(format!("ward {}", ward.id)));
        }
        wards.insert(
            ward.id,
            Arc::new(Mutex::new(WardRow {
                ward,
                retired: false,
            })),
        );
        Ok(())
    }

    /// Remove an empty ward.
    pub fn remove_ward(&self, id: WardId) -> Result<Ward, StoreError> {
        let mut wards = self.wards.write().map_err(poisoned)?;
        let row = wards.get(&id).cloned().ok_or(StoreError::WardNotFound(id))?;
        let mut row = row.lock().map_err(poisoned)?;
        if row.ward.current_occupancy > 0 {
            return Err(StoreError::Conflict(format!(
                "ward {id} still has {} patient(s)",
                row.ward.current_occupancy
            )));
        }
        row.retired = true;
        wards.remove(&id);
        Ok(row.ward.clone())
    }

    /// Register an unassigned patient. Placement goes through
    /// [`AdmissionStore::apply_assignment`].
    pub fn insert_patient(&self, patient: Patient) -> Result<(), StoreError> {
        if patient.ward_id.is_some() {
            return Err(StoreError::Conflict(format!(
                "patient {} must be registered unassigned",
                patient.id
            )));
        }
        let mut patients = self.patients.write().map_err(poisoned)?;
        if patients.contains_key(&patient.id) {
            return Err(StoreError::Conflict(format!("patient {}", patient.id)));
        }
        patients.insert(
            patient.id,
            Arc::new(Mutex::new(PatientRow {
                patient,
                retired: false,
            })),
        );
        Ok(())
    }

    /// Delete a patient, freeing their bed in the same step.
    pub fn remove_patient(&self, id: PatientId) -> Result<Patient, StoreError> {
        let row = self
            .patients
            .write()
            .map_err(poisoned)?
            .remove(&id)
            .ok_or(StoreError::PatientNotFound(id))?;

        let mut row = row.lock().map_err(poisoned)?;
        row.retired = true;
        if let Some(ward_id) = row.patient.ward_id {
            if let Some(ward_row) = self.ward_row(ward_id)? {
                let mut ward_row = ward_row.lock().map_err(poisoned)?;
                ward_row.ward.current_occupancy = ward_row.ward.current_occupancy.saturating_sub(1);
            }
        }
        Ok(row.patient.clone())
    }

    fn ward_row(&self, id: WardId) -> Result<Option<Arc<Mutex<WardRow>>>, StoreError> {
        Ok(self.wards.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn patient_row(&self, id: PatientId) -> Result<Option<Arc<Mutex<PatientRow>>>, StoreError> {
        Ok(self.patients.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn collect_patients<F>(&self, keep: F) -> Result<Vec<Patient>, StoreError>
    where
        F: Fn(&Patient) -> bool,
    {
        let rows: Vec<_> = self
            .patients
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();

        let mut patients = Vec::with_capacity(rows.len());
        for row in rows {
            let row = row.lock().map_err(poisoned)?;
            if !row.retired && keep(&row.patient) {
                patients.push(row.patient.clone());
            }
        }
        Ok(patients)
    }
}

impl AdmissionStore for InMemoryAdmissionStore {
    fn list_wards(&self) -> Result<Vec<Ward>, StoreError> {
        let rows: Vec<_> = self
            .wards
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();

        let mut wards = Vec::with_capacity(rows.len());
        for row in rows {
            let row = row.lock().map_err(poisoned)?;
            if !row.retired {
                wards.push(row.ward.clone());
            }
        }
        Ok(wards)
    }

    fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        self.collect_patients(|_| true)
    }

    fn list_unassigned_patients(&self) -> Result<Vec<Patient>, StoreError> {
        self.collect_patients(|patient| patient.ward_id.is_none())
    }

    fn fetch_patient(&self, id: PatientId) -> Result<Option<Patient>, StoreError> {
        match self.patient_row(id)? {
            Some(row) => {
                let row = row.lock().map_err(poisoned)?;
                Ok((!row.retired).then(|| row.patient.clone()))
            }
            None => Ok(None),
        }
    }

    fn fetch_ward(&self, id: WardId) -> Result<Option<Ward>, StoreError> {
        match self.ward_row(id)? {
            Some(row) => {
                let row = row.lock().map_err(poisoned)?;
                Ok((!row.retired).then(|| row.ward.clone()))
            }
            None => Ok(None),
        }
    }

    fn patients_in_ward(&self, id: WardId) -> Result<Vec<Patient>, StoreError> {
        if self.fetch_ward(id)?.is_none() {
            return Err(StoreError::WardNotFound(id));
        }
        self.collect_patients(|patient| patient.ward_id == Some(id))
    }

    fn apply_assignment(
        &self,
        patient_id: PatientId,
        ward_id: WardId,
        previous_ward_id: Option<WardId>,
    ) -> Result<AssignmentReceipt, StoreError> {
        let patient_row = self
            .patient_row(patient_id)?
            .ok_or(StoreError::PatientNotFound(patient_id))?;
        let target_row = self
            .ward_row(ward_id)?
            .ok_or(StoreError::WardNotFound(ward_id))?;
        let source_row = match previous_ward_id {
            Some(source_id) if source_id != ward_id => Some(
                self.ward_row(source_id)?
                    .ok_or(StoreError::WardNotFound(source_id))?,
            ),
            _ => None,
        };

        let mut patient = patient_row.lock().map_err(poisoned)?;
        if patient.retired {
            return Err(StoreError::PatientNotFound(patient_id));
        }
        if patient.patient.ward_id != previous_ward_id {
            return Err(StoreError::StaleAssignment {
                actual: patient.patient.ward_id,
            });
        }

        let (kind, ward_occupancy) = match (previous_ward_id, source_row) {
            (Some(current), _) if current == ward_id => {
                let target = live_ward(&target_row, ward_id)?;
                (AssignmentKind::Unchanged, target.ward.current_occupancy)
            }
            (Some(from), Some(source_row)) => {
                let (mut source, mut target) = if from < ward_id {
                    let source = live_ward(&source_row, from)?;
                    let target = live_ward(&target_row, ward_id)?;
                    (source, target)
                } else {
                    let target = live_ward(&target_row, ward_id)?;
                    let source = live_ward(&source_row, from)?;
                    (source, target)
                };
                take_bed(&mut target)?;
                source.ward.current_occupancy = source.ward.current_occupancy.saturating_sub(1);
                (AssignmentKind::Moved { from }, target.ward.current_occupancy)
            }
            _ => {
                let mut target = live_ward(&target_row, ward_id)?;
                take_bed(&mut target)?;
                (AssignmentKind::Admitted, target.ward.current_occupancy)
            }
        };

        patient.patient.ward_id = Some(ward_id);

        Ok(AssignmentReceipt {
            patient_id,
            ward_id,
            kind,
            ward_occupancy,
            committed_at: Utc::now(),
        })
    }

    fn release(
        &self,
        patient_id: PatientId,
        previous_ward_id: Option<WardId>,
    ) -> Result<Option<WardId>, StoreError> {
        let patient_row = self
            .patient_row(patient_id)?
            .ok_or(StoreError::PatientNotFound(patient_id))?;
        let ward_row = match previous_ward_id {
            Some(ward_id) => Some(
                self.ward_row(ward_id)?
                    .ok_or(StoreError::WardNotFound(ward_id))?,
            ),
            None => None,
        };

        let mut patient = patient_row.lock().map_err(poisoned)?;
        if patient.retired {
            return Err(StoreError::PatientNotFound(patient_id));
        }
        if patient.patient.ward_id != previous_ward_id {
            return Err(StoreError::StaleAssignment {
                actual: patient.patient.ward_id,
            });
        }

        if let (Some(ward_id), Some(ward_row)) = (previous_ward_id, ward_row) {
            let mut ward = live_ward(&ward_row, ward_id)?;
            ward.ward.current_occupancy = ward.ward.current_occupancy.saturating_sub(1);
        }
        patient.patient.ward_id = None;

        Ok(previous_ward_id)
    }
}

fn live_ward(row: &Mutex<WardRow>, id: WardId) -> Result<MutexGuard<'_, WardRow>, StoreError> {
    let guard = row.lock().map_err(poisoned)?;
    if guard.retired {
        return Err(StoreError::WardNotFound(id));
    }
    Ok(guard)
}

fn take_bed(row: &mut WardRow) -> Result<(), StoreError> {
    if !row.ward.has_free_bed() {
        return Err(StoreError::CapacityExceeded(row.ward.id));
    }
    row.ward.current_occupancy += 1;
    Ok(())
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}
