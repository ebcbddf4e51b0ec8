use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::admissions::domain::{DiagnosisId, Patient, PatientId, Ward, WardId};
use crate::admissions::repository::{AdmissionStore, AssignmentReceipt, StoreError};
use crate::admissions::snapshot::WardSnapshot;
use crate::admissions::store::InMemoryAdmissionStore;
use crate::admissions::{admission_router, AdmissionService, AllocationConfig};

pub(super) fn ward(id: u32, capacity: u32, occupancy: u32, diagnosis: Option<u32>) -> Ward {
    let mut ward = Ward::new(
        WardId(id),
        format!("Ward {id}"),
        capacity,
        diagnosis.map(DiagnosisId),
    )
    .expect("valid ward");
    ward.current_occupancy = occupancy;
    ward
}

pub(super) fn patient(id: u32, diagnosis: u32) -> Patient {
    Patient::new(
        PatientId(id),
        format!("Patient{id}"),
        "Tester",
        None,
        DiagnosisId(diagnosis),
    )
    .expect("valid patient")
}

pub(super) fn snapshot(wards: Vec<Ward>) -> WardSnapshot {
    WardSnapshot::from_wards(wards).expect("valid snapshot")
}

/// Store with empty wards `(id, capacity, diagnosis)` and no patients.
pub(super) fn store_with_wards(wards: &[(u32, u32, Option<u32>)]) -> InMemoryAdmissionStore {
    let store = InMemoryAdmissionStore::new();
    for &(id, capacity, diagnosis) in wards {
        store
            .insert_ward(ward(id, capacity, 0, diagnosis))
            .expect("insert ward");
    }
    store
}

pub(super) fn add_patients(
    store: &InMemoryAdmissionStore,
    ids: impl IntoIterator<Item = u32>,
    diagnosis: u32,
) {
    for id in ids {
        store
            .insert_patient(patient(id, diagnosis))
            .expect("insert patient");
    }
}

pub(super) fn build_service(
    store: InMemoryAdmissionStore,
) -> (
    AdmissionService<InMemoryAdmissionStore>,
    Arc<InMemoryAdmissionStore>,
) {
    let store = Arc::new(store);
    let service = AdmissionService::new(store.clone(), AllocationConfig::default());
    (service, store)
}

pub(super) fn occupancy(store: &impl AdmissionStore, ward_id: u32) -> u32 {
    store
        .fetch_ward(WardId(ward_id))
        .expect("fetch ward")
        .expect("ward present")
        .current_occupancy
}

/// Capacity bounds and counter/membership agreement across the whole store.
pub(super) fn assert_invariants(store: &InMemoryAdmissionStore) {
    let wards = store.list_wards().expect("list wards");
    let patients = store.list_patients().expect("list patients");

    for ward in &wards {
        assert!(
            ward.current_occupancy <= ward.max_capacity,
            "ward {} over capacity: {}/{}",
            ward.id,
            ward.current_occupancy,
            ward.max_capacity
        );
        let members = patients
            .iter()
            .filter(|patient| patient.ward_id == Some(ward.id))
            .count() as u32;
        assert_eq!(
            ward.current_occupancy, members,
            "ward {} counter drifted from membership",
            ward.id
        );
    }

    let total: u32 = wards.iter().map(|ward| ward.current_occupancy).sum();
    let assigned = patients.iter().filter(|patient| patient.is_assigned()).count() as u32;
    assert_eq!(total, assigned);
}

/// Store that lets a competing caller take a bed right before the next commit lands.
pub(super) struct RacingStore {
    pub(super) inner: InMemoryAdmissionStore,
    intruders: Mutex<Vec<(PatientId, WardId)>>,
    commits: AtomicUsize,
}

impl RacingStore {
    pub(super) fn new(inner: InMemoryAdmissionStore, intruders: Vec<(u32, u32)>) -> Self {
        Self {
            inner,
            intruders: Mutex::new(
                intruders
                    .into_iter()
                    .map(|(patient, ward)| (PatientId(patient), WardId(ward)))
                    .collect(),
            ),
            commits: AtomicUsize::new(0),
        }
    }

    /// Commits issued through this store, not counting intruders.
    pub(super) fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl AdmissionStore for RacingStore {
    fn list_wards(&self) -> Result<Vec<Ward>, StoreError> {
        self.inner.list_wards()
    }

    fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        self.inner.list_patients()
    }

    fn list_unassigned_patients(&self) -> Result<Vec<Patient>, StoreError> {
        self.inner.list_unassigned_patients()
    }

    fn fetch_patient(&self, id: PatientId) -> Result<Option<Patient>, StoreError> {
        self.inner.fetch_patient(id)
    }

    fn fetch_ward(&self, id: WardId) -> Result<Option<Ward>, StoreError> {
        self.inner.fetch_ward(id)
    }

    fn patients_in_ward(&self, id: WardId) -> Result<Vec<Patient>, StoreError> {
        self.inner.patients_in_ward(id)
    }

    fn apply_assignment(
        &self,
        patient_id: PatientId,
        ward_id: WardId,
        previous_ward_id: Option<WardId>,
    ) -> Result<AssignmentReceipt, StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let intruder = self.intruders.lock().expect("intruder mutex poisoned").pop();
        if let Some((other, target)) = intruder {
            self.inner
                .apply_assignment(other, target, None)
                .expect("intruder commit succeeds");
        }
        self.inner
            .apply_assignment(patient_id, ward_id, previous_ward_id)
    }

    fn release(
        &self,
        patient_id: PatientId,
        previous_ward_id: Option<WardId>,
    ) -> Result<Option<WardId>, StoreError> {
        self.inner.release(patient_id, previous_ward_id)
    }
}

pub(super) struct UnavailableStore;

impl AdmissionStore for UnavailableStore {
    fn list_wards(&self) -> Result<Vec<Ward>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_unassigned_patients(&self) -> Result<Vec<Patient>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch_patient(&self, _id: PatientId) -> Result<Option<Patient>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch_ward(&self, _id: WardId) -> Result<Option<Ward>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn patients_in_ward(&self, _id: WardId) -> Result<Vec<Patient>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn apply_assignment(
        &self,
        _patient_id: PatientId,
        _ward_id: WardId,
        _previous_ward_id: Option<WardId>,
    ) -> Result<AssignmentReceipt, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn release(
        &self,
        _patient_id: PatientId,
        _previous_ward_id: Option<WardId>,
    ) -> Result<Option<WardId>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with_store(store: InMemoryAdmissionStore) -> axum::Router {
    let (service, _) = build_service(store);
    admission_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
