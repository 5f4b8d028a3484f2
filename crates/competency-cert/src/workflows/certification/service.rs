use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use super::domain::{
    CertificationSubmission, ReviewScope, ReviewerRole, StudentId, SubmissionId,
    SubmissionRequest, SubmissionStatus,
};
use super::notifications::{NotificationChannel, WorkflowEvent, DEFAULT_NOTIFICATION_CAPACITY};
use super::repository::{RepositoryError, RequestContext, SubmissionRepository};
use super::scoring::{CompletionCredit, ScoreCreditSink};
use super::transitions::{next_status, WorkflowAction};
use crate::workflows::levels::LevelCatalog;

static SUBMISSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_submission_id(now: DateTime<Utc>) -> SubmissionId {
    let sequence = SUBMISSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SubmissionId(format!("krs-{}-{sequence:06}", now.timestamp_millis()))
}

/// Approval workflow over certification submissions.
///
/// Mutations on one student's submission are serialized by a per-student lock and guarded by
/// the repository's version check, so concurrent reviewers apply at most one transition and
/// the loser observes [`CertificationError::InvalidTransition`]. Notifications and scoring
/// credit are dispatched only after the repository commits.
pub struct CertificationWorkflow<R, S> {
    repository: Arc<R>,
    credits: Arc<S>,
    catalog: Arc<LevelCatalog>,
    notifications: NotificationChannel,
    locks: StudentLocks,
}

impl<R, S> CertificationWorkflow<R, S>
where
    R: SubmissionRepository + 'static,
    S: ScoreCreditSink + 'static,
{
    pub fn new(repository: Arc<R>, credits: Arc<S>, catalog: LevelCatalog) -> Self {
        Self::with_notification_capacity(
            repository,
            credits,
            catalog,
            DEFAULT_NOTIFICATION_CAPACITY,
        )
    }

    pub fn with_notification_capacity(
        repository: Arc<R>,
        credits: Arc<S>,
        catalog: LevelCatalog,
        capacity: usize,
    ) -> Self {
        Self {
            repository,
            credits,
            catalog: Arc::new(catalog),
            notifications: NotificationChannel::new(capacity),
            locks: StudentLocks::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.notifications.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn tracked_student_locks(&self) -> usize {
        self.locks.tracked()
    }

    /// Number of live notification receivers.
    pub fn subscriber_count(&self) -> usize {
        self.notifications.subscriber_count()
    }

    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    /// Creates or replaces the student's current submission.
    pub fn submit(
        &self,
        ctx: &RequestContext,
        request: SubmissionRequest,
    ) -> Result<CertificationSubmission, CertificationError> {
        if request.student_id.0.trim().is_empty() {
            return Err(ValidationError::MissingStudent.into());
        }

        let items: Vec<String> = request
            .items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        if items.is_empty() {
            return Err(ValidationError::EmptyItems.into());
        }

        let student_id = request.student_id.clone();
        let (record, replaced) = self.locks.with_student(&student_id, || {
            self.store_new_submission(ctx, request, items)
        })?;

        info!(
            submission_id = %record.id,
            student_id = %record.student_id,
            items = record.items.len(),
            replaced = ?replaced.map(|previous| previous.id.0),
            "certification submitted"
        );
        self.publish(&record);

        Ok(record)
    }

    fn store_new_submission(
        &self,
        ctx: &RequestContext,
        request: SubmissionRequest,
        items: Vec<String>,
    ) -> Result<(CertificationSubmission, Option<CertificationSubmission>), CertificationError> {
        let now = Utc::now();
        let record = CertificationSubmission {
            id: next_submission_id(now),
            student_id: request.student_id,
            student_name: request.student_name.trim().to_string(),
            class_label: request.class_label.trim().to_string(),
            department_id: request.department_id,
            items,
            status: SubmissionStatus::PendingSubjectTeacher,
            submitted_at: now,
            updated_at: now,
            subject_teacher_approved_at: None,
            homeroom_approved_at: None,
            hod_approved_at: None,
            exam_date: None,
            notes: None,
            final_score: None,
            version: 0,
        };

        let replaced = self.repository.find_by_student(ctx, &record.student_id)?;
        self.repository.save(ctx, record.clone())?;
        Ok((record, replaced))
    }

    /// Advances the submission when `role` is the reviewer its status is waiting on.
    ///
    /// An HOD approval carrying `exam_date` schedules the exam; without it the submission is
    /// approved and scheduling is deferred to [`CertificationWorkflow::schedule`].
    pub fn approve(
        &self,
        ctx: &RequestContext,
        submission_id: &SubmissionId,
        role: ReviewerRole,
        notes: Option<&str>,
        exam_date: Option<NaiveDate>,
    ) -> Result<CertificationSubmission, CertificationError> {
        let action = WorkflowAction::Approve {
            role,
            schedule: exam_date.is_some(),
        };

        self.transition(ctx, submission_id, action, |record, now| {
            match role {
                ReviewerRole::SubjectTeacher => record.subject_teacher_approved_at = Some(now),
                ReviewerRole::Homeroom => record.homeroom_approved_at = Some(now),
                ReviewerRole::Hod => {
                    record.hod_approved_at = Some(now);
                    record.exam_date = exam_date;
                }
                ReviewerRole::Administrator => {}
            }
            if let Some(notes) = notes {
                record.append_notes(notes);
            }
        })
    }

    /// Rejects a pending submission. The reason is required.
    pub fn reject(
        &self,
        ctx: &RequestContext,
        submission_id: &SubmissionId,
        notes: &str,
    ) -> Result<CertificationSubmission, CertificationError> {
        if notes.trim().is_empty() {
            return Err(ValidationError::MissingRejectionNotes.into());
        }

        self.transition(ctx, submission_id, WorkflowAction::Reject, |record, _| {
            record.append_notes(notes);
        })
    }

    /// Sets the exam date of a submission the HOD approved without one.
    pub fn schedule(
        &self,
        ctx: &RequestContext,
        submission_id: &SubmissionId,
        role: ReviewerRole,
        exam_date: NaiveDate,
    ) -> Result<CertificationSubmission, CertificationError> {
        self.transition(
            ctx,
            submission_id,
            WorkflowAction::Schedule { role },
            |record, _| record.exam_date = Some(exam_date),
        )
    }

    /// Records the exam outcome and applies scoring credit exactly once.
    pub fn complete(
        &self,
        ctx: &RequestContext,
        submission_id: &SubmissionId,
        final_score: Option<u32>,
    ) -> Result<CertificationSubmission, CertificationError> {
        let record = self.transition(ctx, submission_id, WorkflowAction::Complete, |record, _| {
            record.final_score = final_score;
        })?;

        let level = final_score.and_then(|score| self.catalog.resolve(score).cloned());
        let credit = CompletionCredit {
            submission_id: record.id.clone(),
            student_id: record.student_id.clone(),
            department_id: record.department_id.clone(),
            final_score,
            level,
        };
        if let Err(err) = self.credits.apply_credit(credit) {
            error!(
                submission_id = %record.id,
                student_id = %record.student_id,
                error = %err,
                "scoring credit failed after completion was recorded"
            );
        }

        Ok(record)
    }

    pub fn get_current(
        &self,
        ctx: &RequestContext,
        student_id: &StudentId,
    ) -> Result<Option<CertificationSubmission>, CertificationError> {
        Ok(self.repository.find_by_student(ctx, student_id)?)
    }

    pub fn get(
        &self,
        ctx: &RequestContext,
        submission_id: &SubmissionId,
    ) -> Result<CertificationSubmission, CertificationError> {
        self.repository
            .find(ctx, submission_id)?
            .ok_or_else(|| CertificationError::NotFound(submission_id.clone()))
    }

    /// Submissions visible to a reviewer, oldest first.
    pub fn list(
        &self,
        ctx: &RequestContext,
        scope: &ReviewScope,
    ) -> Result<Vec<CertificationSubmission>, CertificationError> {
        let mut visible: Vec<CertificationSubmission> = self
            .repository
            .find_all(ctx)?
            .into_iter()
            .filter(|record| scope.admits(record))
            .collect();
        visible.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(visible)
    }

    fn transition<F>(
        &self,
        ctx: &RequestContext,
        submission_id: &SubmissionId,
        action: WorkflowAction,
        apply: F,
    ) -> Result<CertificationSubmission, CertificationError>
    where
        F: FnOnce(&mut CertificationSubmission, DateTime<Utc>),
    {
        let located = self.get(ctx, submission_id)?;

        let (record, previous) = self.locks.with_student(&located.student_id, || {
            self.apply_transition(ctx, submission_id, action, apply)
        })?;

        info!(
            submission_id = %record.id,
            from = %previous,
            to = %record.status,
            "certification transition committed"
        );
        self.publish(&record);

        Ok(record)
    }

    fn apply_transition<F>(
        &self,
        ctx: &RequestContext,
        submission_id: &SubmissionId,
        action: WorkflowAction,
        apply: F,
    ) -> Result<(CertificationSubmission, SubmissionStatus), CertificationError>
    where
        F: FnOnce(&mut CertificationSubmission, DateTime<Utc>),
    {
        // Re-read under the lock: a competing reviewer may have committed in between.
        let mut record = self.get(ctx, submission_id)?;
        let previous = record.status;
        let Some(next) = next_status(previous, action) else {
            debug!(
                submission_id = %submission_id,
                status = %previous,
                action = action.label(),
                "transition not allowed"
            );
            return Err(CertificationError::InvalidTransition {
                submission_id: submission_id.clone(),
                status: previous,
                action,
            });
        };

        let now = Utc::now();
        record.status = next;
        record.updated_at = now;
        record.version += 1;
        apply(&mut record, now);

        match self.repository.save(ctx, record.clone()) {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => {
                debug!(submission_id = %submission_id, "lost concurrent update");
                return Err(CertificationError::InvalidTransition {
                    submission_id: submission_id.clone(),
                    status: previous,
                    action,
                });
            }
            Err(err) => return Err(err.into()),
        }

        Ok((record, previous))
    }

    fn publish(&self, record: &CertificationSubmission) {
        self.notifications.publish(WorkflowEvent {
            submission_id: record.id.clone(),
            student_id: record.student_id.clone(),
            new_status: record.status,
            occurred_at: record.updated_at,
        });
    }
}

#[derive(Debug, Default)]
struct StudentLocks {
    inner: Mutex<HashMap<StudentId, Arc<Mutex<()>>>>,
}

impl StudentLocks {
    /// Runs `critical` while holding the student's lock.
    ///
    /// The entry is dropped from the map once no other caller holds or waits on it.
    fn with_student<T>(&self, student_id: &StudentId, critical: impl FnOnce() -> T) -> T {
        let lock = self.acquire(student_id);
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            critical()
        };
        self.release(student_id, lock);
        outcome
    }

    fn acquire(&self, student_id: &StudentId) -> Arc<Mutex<()>> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.entry(student_id.clone()).or_default().clone()
    }

    fn release(&self, student_id: &StudentId, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if guard
            .get(student_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            guard.remove(student_id);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Malformed input rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("a submission must select at least one competency criterion")]
    EmptyItems,
    #[error("a rejection must include notes explaining the reason")]
    MissingRejectionNotes,
    #[error("a submission must identify the student")]
    MissingStudent,
}

/// Error raised by the certification workflow.
#[derive(Debug, thiserror::Error)]
pub enum CertificationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot {} submission {submission_id} while it is {status}", .action.label())]
    InvalidTransition {
        submission_id: SubmissionId,
        status: SubmissionStatus,
        action: WorkflowAction,
    },
    #[error("submission {0} not found")]
    NotFound(SubmissionId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CertificationError {
    /// Whether the call was a well-formed request that simply had nothing to act on.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}
