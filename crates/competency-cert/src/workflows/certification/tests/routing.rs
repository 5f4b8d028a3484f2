use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::certification::router::certification_router;
use crate::workflows::certification::service::CertificationWorkflow;
use crate::workflows::levels::LevelCatalog;

fn router() -> Router {
    let (workflow, _, _) = build_workflow();
    certification_router(Arc::new(workflow))
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request builds");

    let response = router.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    (status, read_json_body(response).await)
}

fn submission_body(student: &str) -> Value {
    json!({
        "student_id": student,
        "student_name": "Rizky Pratama",
        "class_label": "XII TKJ 2",
        "department_id": "tkj",
        "items": ["Mengkonfigurasi firewall", "Membuat topologi jaringan"],
    })
}

#[tokio::test]
async fn full_cycle_over_http() {
    let router = router();

    let (status, created) = send(
        &router,
        Method::POST,
        "/api/v1/certifications",
        Some(submission_body("s-100")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending_subject_teacher");
    let id = created["id"].as_str().expect("id").to_string();

    for role in ["subject_teacher", "homeroom"] {
        let (status, _) = send(
            &router,
            Method::POST,
            &format!("/api/v1/certifications/{id}/approve"),
            Some(json!({ "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, scheduled) = send(
        &router,
        Method::POST,
        &format!("/api/v1/certifications/{id}/approve"),
        Some(json!({ "role": "hod", "notes": "Ujian di lab 2", "exam_date": "2025-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scheduled["status"], "scheduled");
    assert_eq!(scheduled["exam_date"], "2025-06-01");

    let (status, completed) = send(
        &router,
        Method::POST,
        &format!("/api/v1/certifications/{id}/complete"),
        Some(json!({ "final_score": 82 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["final_score"], 82);

    let (status, current) = send(
        &router,
        Method::GET,
        "/api/v1/certifications/students/s-100",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["id"], id.as_str());
}

#[tokio::test]
async fn empty_exam_date_counts_as_absent() {
    let (workflow, _, _) = build_workflow();
    let pending = pending_hod(&workflow, "s-101");
    let router = certification_router(Arc::new(workflow));

    let (status, approved) = send(
        &router,
        Method::POST,
        &format!("/api/v1/certifications/{}/approve", pending.id),
        Some(json!({ "role": "hod", "exam_date": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    assert!(approved["exam_date"].is_null());

    let (status, scheduled) = send(
        &router,
        Method::POST,
        &format!("/api/v1/certifications/{}/schedule", pending.id),
        Some(json!({ "role": "hod", "exam_date": "2025-07-15" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scheduled["status"], "scheduled");
}

#[tokio::test]
async fn wrong_reviewer_gets_conflict_with_current_status() {
    let router = router();
    let (_, created) = send(
        &router,
        Method::POST,
        "/api/v1/certifications",
        Some(submission_body("s-102")),
    )
    .await;
    let id = created["id"].as_str().expect("id");

    let (status, payload) = send(
        &router,
        Method::POST,
        &format!("/api/v1/certifications/{id}/approve"),
        Some(json!({ "role": "hod" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(payload["status"], "pending_subject_teacher");
}

#[tokio::test]
async fn validation_failures_are_unprocessable() {
    let router = router();
    let mut body = submission_body("s-103");
    body["items"] = json!([]);

    let (status, payload) = send(&router, Method::POST, "/api/v1/certifications", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("at least one"));

    let (_, created) = send(
        &router,
        Method::POST,
        "/api/v1/certifications",
        Some(submission_body("s-103")),
    )
    .await;
    let id = created["id"].as_str().expect("id");
    let (status, _) = send(
        &router,
        Method::POST,
        &format!("/api/v1/certifications/{id}/reject"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let router = router();

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/v1/certifications/krs-none/complete",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &router,
        Method::GET,
        "/api/v1/certifications/students/nobody",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_uses_reviewer_scope_from_query() {
    let router = router();
    for student in ["s-104", "s-105"] {
        send(
            &router,
            Method::POST,
            "/api/v1/certifications",
            Some(submission_body(student)),
        )
        .await;
    }

    let (status, listed) = send(
        &router,
        Method::GET,
        "/api/v1/certifications?role=subject_teacher&department_id=tkj",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().expect("array").len(), 2);

    let (_, other_department) = send(
        &router,
        Method::GET,
        "/api/v1/certifications?role=subject_teacher&department_id=akl",
        None,
    )
    .await;
    assert!(other_department.as_array().expect("array").is_empty());

    let (status, everything) = send(
        &router,
        Method::GET,
        "/api/v1/certifications?role=administrator",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(everything.as_array().expect("array").len(), 2);
}

#[tokio::test]
async fn repository_outage_is_internal_error() {
    let workflow = CertificationWorkflow::new(
        Arc::new(UnavailableRepository),
        Arc::new(RecordingCredits::default()),
        LevelCatalog::standard(),
    );
    let router = certification_router(Arc::new(workflow));

    let (status, payload) = send(
        &router,
        Method::POST,
        "/api/v1/certifications",
        Some(submission_body("s-106")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("database offline"));
}

#[tokio::test]
async fn level_endpoint_resolves_band_and_criteria() {
    let router = router();

    let (status, payload) = send(&router, Method::GET, "/api/v1/levels/resolve?score=60", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["band"]["badge_name"], "Skilled");
    assert_eq!(payload["criteria"][0]["main"], "1. **Pekerjaan mandiri**");
    assert_eq!(
        payload["criteria"][0]["subs"].as_array().expect("subs").len(),
        2
    );

    let (_, fallback) = send(&router, Method::GET, "/api/v1/levels/resolve?score=150", None).await;
    assert_eq!(fallback["band"]["badge_name"], "Expert");
}
