//! End-to-end admission scenarios over the fixture hospital.
//!
//! Everything goes through the public service facade and HTTP router: seed files are loaded
//! with `load_store`, placements come from `distribute_all` or the API, and occupancy is read
//! back from the store.

use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use ward_admission::admissions::{
    admission_router, load_store, AdmissionError, AdmissionService, AdmissionStore,
    AllocationConfig, AllocationRule, DiagnosisId, FailureReason, InMemoryAdmissionStore, Patient,
    PatientId, Ward, WardId,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture_service() -> AdmissionService<InMemoryAdmissionStore> {
    let (store, summary) =
        load_store(fixture("wards.csv"), Some(fixture("patients.csv"))).expect("fixtures load");
    assert_eq!(summary.wards, 4);
    assert_eq!(summary.patients, 11);
    assert_eq!(summary.placed, 2);
    AdmissionService::new(Arc::new(store), AllocationConfig::default())
}

async fn send(router: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[test]
fn fixture_hospital_fills_every_bed_in_policy_order() {
    let service = fixture_service();

    let report = service.distribute_all().expect("run completes");

    let placements: Vec<(u32, u32, AllocationRule)> = report
        .assigned
        .iter()
        .map(|entry| (entry.patient_id.0, entry.ward_id.0, entry.rule))
        .collect();
    assert_eq!(
        placements,
        vec![
            (2, 1, AllocationRule::DiagnosisMatch),
            (3, 2, AllocationRule::DiagnosisMatch),
            (4, 2, AllocationRule::DiagnosisMatch),
            (5, 4, AllocationRule::EmptyWard),
            (7, 3, AllocationRule::LowestOccupancy),
            (8, 1, AllocationRule::DiagnosisMatch),
            (9, 3, AllocationRule::LowestOccupancy),
            (10, 3, AllocationRule::LowestOccupancy),
        ]
    );
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].patient_id, PatientId(11));
    assert_eq!(report.failed[0].reason, FailureReason::NoWardAvailable);
    assert!(!report.is_complete());

    let occupancy = service.occupancy_report().expect("report builds");
    assert_eq!(occupancy.total_capacity, 10);
    assert_eq!(occupancy.total_occupancy, 10);
    assert_eq!(occupancy.total_patients, 11);
    assert_eq!(occupancy.unassigned_patients, 1);
    assert_eq!(occupancy.occupancy_percent(), 100);
}

#[test]
fn diagnosis_stats_cover_assigned_and_waiting_patients() {
    let service = fixture_service();
    let before = service.diagnosis_stats().expect("stats build");
    service.distribute_all().expect("distribution runs");
    let after = service.diagnosis_stats().expect("stats build");

    for stats in [&before, &after] {
        assert_eq!(stats.total_patients, 11);
        let rows: Vec<_> = stats
            .diagnoses
            .iter()
            .map(|entry| (entry.diagnosis_id, entry.patients, entry.percent))
            .collect();
        assert_eq!(
            rows,
            vec![
                (DiagnosisId(1), 4, 36.4),
                (DiagnosisId(2), 3, 27.3),
                (DiagnosisId(3), 2, 18.2),
                (DiagnosisId(4), 2, 18.2),
            ]
        );
    }
}

#[tokio::test]
async fn http_discharge_frees_a_bed_for_the_leftover_patient() {
    let router = admission_router(Arc::new(fixture_service()));

    let (status, report) = send(&router, "POST", "/api/v1/admissions/distribute").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["failed"][0]["patient_id"], json!(11));

    let (status, body) = send(&router, "POST", "/api/v1/patients/11/admit").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["patient_id"], json!(11));

    let (status, _) = send(&router, "GET", "/api/v1/wards/available").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, "DELETE", "/api/v1/patients/4/ward").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released_ward_id"], json!(2));

    let (status, body) = send(&router, "GET", "/api/v1/patients/11/ward-suggestion").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ward_id"], json!(2));
    assert_eq!(body["rule"], json!("lowest_occupancy"));

    let (status, body) = send(&router, "POST", "/api/v1/patients/11/admit").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["receipt"]["ward_id"], json!(2));
    assert_eq!(body["receipt"]["ward_occupancy"], json!(2));

    let (_, members) = send(&router, "GET", "/api/v1/wards/2/patients").await;
    let ids: Vec<u64> = members
        .as_array()
        .expect("patient list")
        .iter()
        .filter_map(|patient| patient["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![3, 11]);
}

#[test]
fn parallel_admissions_stop_at_capacity() {
    let store = InMemoryAdmissionStore::new();
    store
        .insert_ward(Ward::new(WardId(1), "Intensive Care", 5, None).expect("valid ward"))
        .expect("ward registered");
    for id in 1..=20 {
        store
            .insert_patient(
                Patient::new(PatientId(id), "Test", "Patient", None, DiagnosisId(1))
                    .expect("valid patient"),
            )
            .expect("patient registered");
    }
    let store = Arc::new(store);
    let service = Arc::new(AdmissionService::new(
        store.clone(),
        AllocationConfig::default(),
    ));
    let barrier = Arc::new(Barrier::new(20));

    let handles: Vec<_> = (1..=20)
        .map(|id| {
            let service = service.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                service.admit(PatientId(id))
            })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        match handle.join().expect("thread finished") {
            Ok(_) => admitted += 1,
            Err(AdmissionError::NoWardAvailable(_))
            | Err(AdmissionError::CapacityExceeded { .. }) => {}
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }

    assert_eq!(admitted, 5);
    let ward = store
        .fetch_ward(WardId(1))
        .expect("store reachable")
        .expect("ward present");
    assert_eq!(ward.current_occupancy, 5);
    assert_eq!(
        store
            .patients_in_ward(WardId(1))
            .expect("store reachable")
            .len(),
        5
    );
}
