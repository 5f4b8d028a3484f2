use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::json;

use super::domain::{ReviewScope, ReviewerRole, StudentId, SubmissionId, SubmissionRequest};
use super::repository::{RepositoryError, RequestContext, SubmissionRepository};
use super::scoring::ScoreCreditSink;
use super::service::{CertificationError, CertificationWorkflow};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Router builder exposing the certification workflow over HTTP.
pub fn certification_router<R, S>(workflow: Arc<CertificationWorkflow<R, S>>) -> Router
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/certifications",
            post(submit_handler::<R, S>).get(list_handler::<R, S>),
        )
        .route(
            "/api/v1/certifications/students/:student_id",
            get(current_handler::<R, S>),
        )
        .route(
            "/api/v1/certifications/:submission_id/approve",
            post(approve_handler::<R, S>),
        )
        .route(
            "/api/v1/certifications/:submission_id/reject",
            post(reject_handler::<R, S>),
        )
        .route(
            "/api/v1/certifications/:submission_id/schedule",
            post(schedule_handler::<R, S>),
        )
        .route(
            "/api/v1/certifications/:submission_id/complete",
            post(complete_handler::<R, S>),
        )
        .route("/api/v1/levels/resolve", get(level_handler::<R, S>))
        .with_state(workflow)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalBody {
    pub(crate) role: ReviewerRole,
    #[serde(default)]
    pub(crate) notes: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) exam_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectionBody {
    #[serde(default)]
    pub(crate) notes: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleBody {
    pub(crate) role: ReviewerRole,
    pub(crate) exam_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompletionBody {
    #[serde(default)]
    pub(crate) final_score: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LevelQuery {
    pub(crate) score: u32,
    #[serde(default)]
    pub(crate) department_id: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn request_context() -> RequestContext {
    RequestContext::with_timeout(REQUEST_TIMEOUT)
}

pub(crate) async fn submit_handler<R, S>(
    State(workflow): State<Arc<CertificationWorkflow<R, S>>>,
    axum::Json(request): axum::Json<SubmissionRequest>,
) -> Response
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    match workflow.submit(&request_context(), request) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<R, S>(
    State(workflow): State<Arc<CertificationWorkflow<R, S>>>,
    Query(scope): Query<ReviewScope>,
) -> Response
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    match workflow.list(&request_context(), &scope) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn current_handler<R, S>(
    State(workflow): State<Arc<CertificationWorkflow<R, S>>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    let student_id = StudentId(student_id);
    match workflow.get_current(&request_context(), &student_id) {
        Ok(Some(record)) => (StatusCode::OK, axum::Json(record)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": format!("student {student_id} has no current submission"),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn approve_handler<R, S>(
    State(workflow): State<Arc<CertificationWorkflow<R, S>>>,
    Path(submission_id): Path<String>,
    axum::Json(body): axum::Json<ApprovalBody>,
) -> Response
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    let result = workflow.approve(
        &request_context(),
        &SubmissionId(submission_id),
        body.role,
        body.notes.as_deref(),
        body.exam_date,
    );
    match result {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reject_handler<R, S>(
    State(workflow): State<Arc<CertificationWorkflow<R, S>>>,
    Path(submission_id): Path<String>,
    axum::Json(body): axum::Json<RejectionBody>,
) -> Response
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    match workflow.reject(&request_context(), &SubmissionId(submission_id), &body.notes) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn schedule_handler<R, S>(
    State(workflow): State<Arc<CertificationWorkflow<R, S>>>,
    Path(submission_id): Path<String>,
    axum::Json(body): axum::Json<ScheduleBody>,
) -> Response
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    let result = workflow.schedule(
        &request_context(),
        &SubmissionId(submission_id),
        body.role,
        body.exam_date,
    );
    match result {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn complete_handler<R, S>(
    State(workflow): State<Arc<CertificationWorkflow<R, S>>>,
    Path(submission_id): Path<String>,
    axum::Json(body): axum::Json<CompletionBody>,
) -> Response
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    let result = workflow.complete(
        &request_context(),
        &SubmissionId(submission_id),
        body.final_score,
    );
    match result {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn level_handler<R, S>(
    State(workflow): State<Arc<CertificationWorkflow<R, S>>>,
    Query(query): Query<LevelQuery>,
) -> Response
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    let catalog = workflow.catalog();
    match catalog.resolve(query.score) {
        Some(band) => {
            let department = query.department_id.as_deref().unwrap_or_default();
            let payload = json!({
                "score": query.score,
                "band": band,
                "criteria": catalog.criteria_groups(department, band.rank),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        None => {
            let payload = json!({ "error": "level catalog has no bands" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

fn error_response(err: CertificationError) -> Response {
    let status = match &err {
        CertificationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CertificationError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CertificationError::NotFound(_) => StatusCode::NOT_FOUND,
        CertificationError::Repository(RepositoryError::Abandoned) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CertificationError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = match &err {
        CertificationError::InvalidTransition { status, .. } => json!({
            "error": err.to_string(),
            "status": status,
        }),
        _ => json!({ "error": err.to_string() }),
    };

    (status, axum::Json(payload)).into_response()
}
