use serde::Serialize;

use super::domain::{ReviewerRole, SubmissionStatus};

/// Mutation requested against a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowAction {
    Approve {
        role: ReviewerRole,
        /// HOD approval carrying an exam date.
        schedule: bool,
    },
    Reject,
    Schedule {
        role: ReviewerRole,
    },
    Complete,
}

impl WorkflowAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Reject => "reject",
            Self::Schedule { .. } => "schedule",
            Self::Complete => "complete",
        }
    }
}

/// Transition table of the approval workflow. `None` marks an illegal move.
pub fn next_status(current: SubmissionStatus, action: WorkflowAction) -> Option<SubmissionStatus> {
    use ReviewerRole as Role;
    use SubmissionStatus as Status;

    match action {
        WorkflowAction::Approve { role, schedule } => match (current, role) {
            (Status::PendingSubjectTeacher, Role::SubjectTeacher) => Some(Status::PendingHomeroom),
            (Status::PendingHomeroom, Role::Homeroom) => Some(Status::PendingHod),
            (Status::PendingHod, Role::Hod) if schedule => Some(Status::Scheduled),
            (Status::PendingHod, Role::Hod) => Some(Status::Approved),
            (
                Status::PendingSubjectTeacher
                | Status::PendingHomeroom
                | Status::PendingHod
                | Status::Approved
                | Status::Scheduled
                | Status::Rejected
                | Status::Completed,
                Role::SubjectTeacher | Role::Homeroom | Role::Hod | Role::Administrator,
            ) => None,
        },
        WorkflowAction::Reject => match current {
            Status::PendingSubjectTeacher | Status::PendingHomeroom | Status::PendingHod => {
                Some(Status::Rejected)
            }
            Status::Approved | Status::Scheduled | Status::Rejected | Status::Completed => None,
        },
        WorkflowAction::Schedule { role } => match (current, role) {
            (Status::Approved, Role::Hod) => Some(Status::Scheduled),
            _ => None,
        },
        WorkflowAction::Complete => match current {
            Status::Scheduled => Some(Status::Completed),
            Status::PendingSubjectTeacher
            | Status::PendingHomeroom
            | Status::PendingHod
            | Status::Approved
            | Status::Rejected
            | Status::Completed => None,
        },
    }
}
