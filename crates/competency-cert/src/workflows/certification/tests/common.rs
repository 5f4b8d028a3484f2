use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::workflows::certification::domain::{
    CertificationSubmission, DepartmentId, ReviewerRole, StudentId, SubmissionId,
    SubmissionRequest,
};
use crate::workflows::certification::notifications::WorkflowEvent;
use crate::workflows::certification::repository::{
    RepositoryError, RequestContext, SubmissionRepository,
};
use crate::workflows::certification::scoring::{CompletionCredit, CreditError, ScoreCreditSink};
use crate::workflows::certification::service::CertificationWorkflow;
use crate::workflows::certification::store::InMemorySubmissionRepository;
use crate::workflows::levels::LevelCatalog;

pub(super) type MemoryWorkflow = CertificationWorkflow<InMemorySubmissionRepository, RecordingCredits>;

pub(super) fn ctx() -> RequestContext {
    RequestContext::background()
}

pub(super) fn exam_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
}

pub(super) fn request(student: &str) -> SubmissionRequest {
    SubmissionRequest {
        student_id: StudentId(student.to_string()),
        student_name: "Dewi Lestari".to_string(),
        class_label: "XI TKJ 1".to_string(),
        department_id: DepartmentId("tkj".to_string()),
        items: vec![
            "Menginstalasi sistem operasi jaringan".to_string(),
            "Mengkonfigurasi VLAN".to_string(),
            "Menganalisis kerusakan jaringan".to_string(),
        ],
    }
}

pub(super) fn request_in(
    student: &str,
    department: &str,
    class_label: &str,
) -> SubmissionRequest {
    SubmissionRequest {
        department_id: DepartmentId(department.to_string()),
        class_label: class_label.to_string(),
        ..request(student)
    }
}

pub(super) fn build_workflow() -> (
    MemoryWorkflow,
    Arc<InMemorySubmissionRepository>,
    Arc<RecordingCredits>,
) {
    let repository = Arc::new(InMemorySubmissionRepository::default());
    let credits = Arc::new(RecordingCredits::default());
    let workflow =
        CertificationWorkflow::new(repository.clone(), credits.clone(), LevelCatalog::standard());
    (workflow, repository, credits)
}

/// Submits for `student` and walks the submission up to the HOD stage.
pub(super) fn pending_hod(workflow: &MemoryWorkflow, student: &str) -> CertificationSubmission {
    let submitted = workflow.submit(&ctx(), request(student)).expect("submit");
    workflow
        .approve(&ctx(), &submitted.id, ReviewerRole::SubjectTeacher, None, None)
        .expect("subject teacher approves");
    workflow
        .approve(&ctx(), &submitted.id, ReviewerRole::Homeroom, None, None)
        .expect("homeroom approves")
}

pub(super) fn scheduled(workflow: &MemoryWorkflow, student: &str) -> CertificationSubmission {
    let pending = pending_hod(workflow, student);
    workflow
        .approve(
            &ctx(),
            &pending.id,
            ReviewerRole::Hod,
            None,
            Some(exam_date()),
        )
        .expect("hod schedules")
}

pub(super) fn stored_bytes(
    repository: &InMemorySubmissionRepository,
    id: &SubmissionId,
) -> Vec<u8> {
    let record = repository
        .find(&ctx(), id)
        .expect("find succeeds")
        .expect("record present");
    serde_json::to_vec(&record).expect("serialize record")
}

pub(super) fn drain(receiver: &mut broadcast::Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[derive(Default)]
pub(super) struct RecordingCredits {
    credits: Mutex<Vec<CompletionCredit>>,
}

impl RecordingCredits {
    pub(super) fn credits(&self) -> Vec<CompletionCredit> {
        self.credits.lock().expect("credit mutex poisoned").clone()
    }
}

impl ScoreCreditSink for RecordingCredits {
    fn apply_credit(&self, credit: CompletionCredit) -> Result<(), CreditError> {
        self.credits
            .lock()
            .expect("credit mutex poisoned")
            .push(credit);
        Ok(())
    }
}

pub(super) struct FailingCredits;

impl ScoreCreditSink for FailingCredits {
    fn apply_credit(&self, _credit: CompletionCredit) -> Result<(), CreditError> {
        Err(CreditError::Unavailable("ledger offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl SubmissionRepository for UnavailableRepository {
    fn save(
        &self,
        _ctx: &RequestContext,
        _record: CertificationSubmission,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find(
        &self,
        _ctx: &RequestContext,
        _id: &SubmissionId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_student(
        &self,
        _ctx: &RequestContext,
        _student_id: &StudentId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_all(
        &self,
        _ctx: &RequestContext,
    ) -> Result<Vec<CertificationSubmission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
