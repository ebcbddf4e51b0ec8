use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{PatientId, WardId};
use super::error::AdmissionError;
use super::policy::{AllocationRule, WardSelection};
use super::repository::AdmissionStore;
use super::service::AdmissionService;

/// Router builder exposing the admission engine over HTTP.
pub fn admission_router<S>(service: Arc<AdmissionService<S>>) -> Router
where
    S: AdmissionStore + 'static,
{
    Router::new()
        .route("/api/v1/wards", get(list_wards_handler::<S>))
        .route("/api/v1/wards/available", get(available_wards_handler::<S>))
        .route(
            "/api/v1/wards/:ward_id/patients",
            get(ward_patients_handler::<S>),
        )
        .route(
            "/api/v1/patients/:patient_id/ward-suggestion",
            get(suggestion_handler::<S>),
        )
        .route(
            "/api/v1/patients/:patient_id/ward",
            put(assign_handler::<S>).delete(discharge_handler::<S>),
        )
        .route(
            "/api/v1/patients/:patient_id/admit",
            post(admit_handler::<S>),
        )
        .route(
            "/api/v1/admissions/distribute",
            post(distribute_handler::<S>),
        )
        .route(
            "/api/v1/reports/occupancy",
            get(occupancy_handler::<S>),
        )
        .route(
            "/api/v1/reports/diagnoses",
            get(diagnosis_stats_handler::<S>),
        )
        .with_state(service)
}

/// Body of `PUT /api/v1/patients/:patient_id/ward`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AssignWardRequest {
    pub ward_id: WardId,
}

/// Read-only policy preview returned to suggestion UIs.
#[derive(Debug, Clone, Serialize)]
pub struct WardSuggestionView {
    pub patient_id: PatientId,
    pub ward_id: WardId,
    pub rule: AllocationRule,
    pub rationale: String,
}

impl WardSuggestionView {
    fn new(patient_id: PatientId, selection: WardSelection) -> Self {
        Self {
            patient_id,
            ward_id: selection.ward_id,
            rule: selection.rule,
            rationale: selection.summary(),
        }
    }
}

/// HTTP status for each engine failure.
pub fn status_for(error: &AdmissionError) -> StatusCode {
    match error {
        AdmissionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AdmissionError::PatientNotFound { .. } | AdmissionError::WardNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        AdmissionError::CapacityExceeded { .. }
        | AdmissionError::AlreadyAssigned { .. }
        | AdmissionError::NoWardAvailable(_) => StatusCode::CONFLICT,
        AdmissionError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn error_response(error: AdmissionError) -> Response {
    let payload = match &error {
        AdmissionError::NoWardAvailable(outcome) => json!({
            "error": error.to_string(),
            "patient_id": outcome.patient_id,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status_for(&error), axum::Json(payload)).into_response()
}

/// Malformed ids and bodies are reported like any other invalid input.
fn path_id(path: Result<Path<u32>, PathRejection>) -> Result<u32, AdmissionError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| AdmissionError::Validation(rejection.body_text()))
}

fn json_body<T>(body: Result<axum::Json<T>, JsonRejection>) -> Result<T, AdmissionError> {
    body.map(|axum::Json(value)| value)
        .map_err(|rejection| AdmissionError::Validation(rejection.body_text()))
}

fn respond<T: Serialize>(result: Result<T, AdmissionError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_wards_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(
        service
            .snapshot()
            .map(|snapshot| snapshot.iter().cloned().collect::<Vec<_>>()),
    )
}

pub(crate) async fn available_wards_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(service.available_wards())
}

pub(crate) async fn ward_patients_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
    ward_id: Result<Path<u32>, PathRejection>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(path_id(ward_id).and_then(|ward_id| service.ward_patients(WardId(ward_id))))
}

pub(crate) async fn suggestion_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
    patient_id: Result<Path<u32>, PathRejection>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(path_id(patient_id).and_then(|patient_id| {
        let patient_id = PatientId(patient_id);
        service
            .suggest_ward(patient_id)
            .map(|selection| WardSuggestionView::new(patient_id, selection))
    }))
}

pub(crate) async fn assign_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
    patient_id: Result<Path<u32>, PathRejection>,
    request: Result<axum::Json<AssignWardRequest>, JsonRejection>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(path_id(patient_id).and_then(|patient_id| {
        let request = json_body(request)?;
        service.commit_assignment(PatientId(patient_id), request.ward_id)
    }))
}

pub(crate) async fn admit_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
    patient_id: Result<Path<u32>, PathRejection>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(path_id(patient_id).and_then(|patient_id| {
        let patient_id = PatientId(patient_id);
        service.admit(patient_id).map(|placement| {
            json!({
                "suggestion": WardSuggestionView::new(patient_id, placement.selection),
                "receipt": placement.receipt,
            })
        })
    }))
}

pub(crate) async fn discharge_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
    patient_id: Result<Path<u32>, PathRejection>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(path_id(patient_id).and_then(|patient_id| {
        let patient_id = PatientId(patient_id);
        service.discharge(patient_id).map(|released| {
            json!({
                "patient_id": patient_id,
                "released_ward_id": released,
            })
        })
    }))
}

pub(crate) async fn distribute_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(service.distribute_all())
}

pub(crate) async fn occupancy_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(service.occupancy_report())
}

pub(crate) async fn diagnosis_stats_handler<S>(
    State(service): State<Arc<AdmissionService<S>>>,
) -> Response
where
    S: AdmissionStore + 'static,
{
    respond(service.diagnosis_stats())
}
