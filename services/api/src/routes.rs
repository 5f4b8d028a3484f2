use crate::infra::{AppState, ServiceWorkflow};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use competency_cert::workflows::certification::{certification_router, StandingLedger, StudentId};
use competency_cert::workflows::criteria::{group, CriteriaGroup};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct CriteriaPreviewRequest {
    pub(crate) items: Vec<String>,
}

pub(crate) fn with_service_routes(
    workflow: Arc<ServiceWorkflow>,
    ledger: Arc<StandingLedger>,
) -> axum::Router {
    certification_router(workflow)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/criteria/preview",
            axum::routing::post(criteria_preview_endpoint),
        )
        .route(
            "/api/v1/students/:student_id/standing",
            axum::routing::get(standing_endpoint),
        )
        .layer(Extension(ledger))
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

/// Groups draft criteria the way the review screens will show them.
pub(crate) async fn criteria_preview_endpoint(
    Json(payload): Json<CriteriaPreviewRequest>,
) -> Json<Vec<CriteriaGroup>> {
    Json(group(&payload.items))
}

pub(crate) async fn standing_endpoint(
    Extension(ledger): Extension<Arc<StandingLedger>>,
    Path(student_id): Path<String>,
) -> impl IntoResponse {
    let student_id = StudentId(student_id);
    match ledger.standing(&student_id) {
        Some(standing) => (StatusCode::OK, Json(json!(standing))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("student {student_id} has no recorded standing") })),
        ),
    }
}
