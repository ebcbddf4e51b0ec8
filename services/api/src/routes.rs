use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use ward_admission::admissions::{admission_router, AdmissionService, AdmissionStore};

pub(crate) fn with_admission_routes<S>(service: Arc<AdmissionService<S>>) -> axum::Router
where
    S: AdmissionStore + 'static,
{
    admission_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;
    use ward_admission::admissions::{
        AllocationConfig, InMemoryAdmissionStore, Patient, PatientId, Ward, WardId, DiagnosisId,
    };

    fn app(ready: bool) -> (axum::Router, Arc<AtomicBool>) {
        let store = InMemoryAdmissionStore::new();
        store
            .insert_ward(Ward::new(WardId(1), "Cardiology", 2, Some(DiagnosisId(1))).expect("ward"))
            .expect("ward inserted");
        store
            .insert_patient(
                Patient::new(PatientId(1), "Anna", "Kowalska", None, DiagnosisId(1))
                    .expect("patient"),
            )
            .expect("patient inserted");

        let readiness = Arc::new(AtomicBool::new(ready));
        let state = AppState {
            readiness: readiness.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let service = Arc::new(AdmissionService::new(
            Arc::new(store),
            AllocationConfig::default(),
        ));
        let router = with_admission_routes(service).layer(Extension(state));
        (router, readiness)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    #[tokio::test]
    async fn readiness_tracks_flag() {
        let (router, readiness) = app(false);

        let response = router
            .clone()
            .oneshot(get("/ready"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "initializing");

        readiness.store(true, Ordering::Release);
        let response = router.oneshot(get("/ready")).await.expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_metrics_are_served() {
        let (router, _) = app(true);

        let health = router
            .clone()
            .oneshot(get("/health"))
            .await
            .expect("route executes");
        assert_eq!(body_json(health).await["status"], "ok");

        let metrics = router.oneshot(get("/metrics")).await.expect("route executes");
        assert_eq!(metrics.status(), StatusCode::OK);
        assert_eq!(
            metrics.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn admission_routes_are_mounted() {
        let (router, _) = app(true);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/patients/1/admit")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["receipt"]["ward_id"], 1);
        assert_eq!(payload["suggestion"]["rule"], "diagnosis_match");
    }
}
