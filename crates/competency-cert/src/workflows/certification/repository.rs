use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::domain::{CertificationSubmission, StudentId, SubmissionId};

/// Request-scoped deadline and cancellation handed to every repository call.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    /// Context without a deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn ensure_active(&self) -> Result<(), RepositoryError> {
        if self.is_cancelled() {
            return Err(RepositoryError::Abandoned);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(RepositoryError::Abandoned),
            _ => Ok(()),
        }
    }
}

/// Storage contract for certification submissions.
///
/// A repository holds one current submission per student. `save` replaces the student's
/// record atomically; reads reflect the latest committed `save`.
pub trait SubmissionRepository: Send + Sync {
    /// Stores `record` as the student's current submission.
    ///
    /// When the stored record has the same id, `record.version` must be exactly one past the
    /// stored version, otherwise the save fails with [`RepositoryError::Conflict`].
    fn save(&self, ctx: &RequestContext, record: CertificationSubmission)
        -> Result<(), RepositoryError>;
    fn find(
        &self,
        ctx: &RequestContext,
        id: &SubmissionId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError>;
    fn find_by_student(
        &self,
        ctx: &RequestContext,
        student_id: &StudentId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError>;
    fn find_all(&self, ctx: &RequestContext)
        -> Result<Vec<CertificationSubmission>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently")]
    Conflict,
    #[error("request abandoned before the repository responded")]
    Abandoned,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Optimistic version check shared by the bundled stores.
pub(crate) fn check_version(
    stored: Option<&CertificationSubmission>,
    incoming: &CertificationSubmission,
) -> Result<(), RepositoryError> {
    match stored {
        Some(current) if current.id == incoming.id && current.version + 1 != incoming.version => {
            Err(RepositoryError::Conflict)
        }
        _ => Ok(()),
    }
}
