//! Competency certification requests (KRS) and their approval workflow.
//!
//! A student submits the criteria they want to be examined on. The submission then waits on
//! the subject teacher, the homeroom teacher, and the head of department in turn; the HOD may
//! schedule the exam while approving. Completing the exam records the final score and hands
//! scoring credit to an external sink.

pub mod domain;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod store;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use domain::{
    CertificationSubmission, DepartmentId, ReviewScope, ReviewerRole, StudentId, SubmissionId,
    SubmissionRequest, SubmissionStatus,
};
pub use notifications::{NotificationChannel, WorkflowEvent};
pub use repository::{RepositoryError, RequestContext, SubmissionRepository};
pub use router::certification_router;
pub use scoring::{CompletionCredit, CreditError, ScoreCreditSink, Standing, StandingLedger};
pub use service::{CertificationError, CertificationWorkflow, ValidationError};
pub use store::{InMemorySubmissionRepository, SnapshotFileRepository};
pub use transitions::{next_status, WorkflowAction};
