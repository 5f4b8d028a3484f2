use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for certification submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vocational department (jurusan) a student belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(pub String);

impl fmt::Display for DepartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reviewer acting on a submission. Authentication happens upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerRole {
    SubjectTeacher,
    Homeroom,
    Hod,
    Administrator,
}

impl ReviewerRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SubjectTeacher => "Subject Teacher",
            Self::Homeroom => "Homeroom Teacher",
            Self::Hod => "Head of Department",
            Self::Administrator => "Administrator",
        }
    }
}

/// Position of a submission in the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingSubjectTeacher,
    PendingHomeroom,
    PendingHod,
    Approved,
    Scheduled,
    Rejected,
    Completed,
}

impl SubmissionStatus {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::PendingSubjectTeacher,
            Self::PendingHomeroom,
            Self::PendingHod,
            Self::Approved,
            Self::Scheduled,
            Self::Rejected,
            Self::Completed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingSubjectTeacher => "pending_subject_teacher",
            Self::PendingHomeroom => "pending_homeroom",
            Self::PendingHod => "pending_hod",
            Self::Approved => "approved",
            Self::Scheduled => "scheduled",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::PendingSubjectTeacher | Self::PendingHomeroom | Self::PendingHod
        )
    }

    /// Reviewer whose approval moves the submission forward.
    pub const fn expected_reviewer(self) -> Option<ReviewerRole> {
        match self {
            Self::PendingSubjectTeacher => Some(ReviewerRole::SubjectTeacher),
            Self::PendingHomeroom => Some(ReviewerRole::Homeroom),
            Self::PendingHod => Some(ReviewerRole::Hod),
            Self::Approved | Self::Scheduled | Self::Rejected | Self::Completed => None,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Student-provided request to be examined on a set of criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub student_id: StudentId,
    pub student_name: String,
    pub class_label: String,
    pub department_id: DepartmentId,
    pub items: Vec<String>,
}

/// Current certification request of a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationSubmission {
    pub id: SubmissionId,
    pub student_id: StudentId,
    pub student_name: String,
    pub class_label: String,
    pub department_id: DepartmentId,
    pub items: Vec<String>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub subject_teacher_approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub homeroom_approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hod_approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exam_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub final_score: Option<u32>,
    /// Incremented by every committed mutation; used for optimistic concurrency.
    #[serde(default)]
    pub version: u64,
}

impl CertificationSubmission {
    /// Appends reviewer notes on a new line, ignoring blank input.
    pub fn append_notes(&mut self, notes: &str) {
        let notes = notes.trim();
        if notes.is_empty() {
            return;
        }

        match &mut self.notes {
            Some(existing) if !existing.is_empty() => {
                existing.push('\n');
                existing.push_str(notes);
            }
            _ => self.notes = Some(notes.to_string()),
        }
    }
}

/// Reviewer scope used to build approval queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewScope {
    pub role: ReviewerRole,
    /// Required for every role except `Administrator`, which sees all departments.
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub class_label: Option<String>,
}

impl ReviewScope {
    pub fn new(role: ReviewerRole, department_id: impl Into<String>) -> Self {
        Self {
            role,
            department_id: Some(DepartmentId(department_id.into())),
            class_label: None,
        }
    }

    /// Scope of an administrator, who is not tied to a department.
    pub fn administrator() -> Self {
        Self {
            role: ReviewerRole::Administrator,
            department_id: None,
            class_label: None,
        }
    }

    pub fn with_class(mut self, class_label: impl Into<String>) -> Self {
        self.class_label = Some(class_label.into());
        self
    }

    /// Whether a submission belongs in this reviewer's queue.
    pub fn admits(&self, submission: &CertificationSubmission) -> bool {
        let status_visible = match self.role {
            ReviewerRole::SubjectTeacher => {
                submission.status == SubmissionStatus::PendingSubjectTeacher
            }
            ReviewerRole::Homeroom => submission.status == SubmissionStatus::PendingHomeroom,
            ReviewerRole::Hod => matches!(
                submission.status,
                SubmissionStatus::PendingHod
                    | SubmissionStatus::Approved
                    | SubmissionStatus::Scheduled
            ),
            ReviewerRole::Administrator => return true,
        };

        if !status_visible || self.department_id.as_ref() != Some(&submission.department_id) {
            return false;
        }

        match (self.role, self.class_label.as_deref()) {
            (ReviewerRole::Homeroom, Some(class_label)) => submission.class_label == class_label,
            _ => true,
        }
    }
}
