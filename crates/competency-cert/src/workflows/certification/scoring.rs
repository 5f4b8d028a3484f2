use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::domain::{DepartmentId, StudentId, SubmissionId};
use crate::workflows::levels::LevelBand;

/// Credit handed to the scoring collaborator once per completed exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCredit {
    pub submission_id: SubmissionId,
    pub student_id: StudentId,
    pub department_id: DepartmentId,
    pub final_score: Option<u32>,
    /// Tier resolved for `final_score`.
    pub level: Option<LevelBand>,
}

/// Outbound hook applying score and attendance credit for a completed exam.
pub trait ScoreCreditSink: Send + Sync {
    fn apply_credit(&self, credit: CompletionCredit) -> Result<(), CreditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("credit sink unavailable: {0}")]
    Unavailable(String),
}

/// Recorded standing of a student.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Standing {
    pub score: u32,
    pub level: Option<LevelBand>,
    pub completed_exams: u32,
}

/// In-process ledger whose standings never decrease.
#[derive(Debug, Default)]
pub struct StandingLedger {
    standings: Mutex<HashMap<StudentId, Standing>>,
}

impl StandingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standing(&self, student_id: &StudentId) -> Option<Standing> {
        self.standings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(student_id)
            .cloned()
    }
}

impl ScoreCreditSink for StandingLedger {
    fn apply_credit(&self, credit: CompletionCredit) -> Result<(), CreditError> {
        let mut guard = self.standings.lock().unwrap_or_else(PoisonError::into_inner);
        let standing = guard.entry(credit.student_id).or_default();
        standing.completed_exams += 1;

        match credit.final_score {
            Some(score) if score >= standing.score => {
                standing.score = score;
                if credit.level.is_some() {
                    standing.level = credit.level;
                }
            }
            _ => {
                if standing.level.is_none() {
                    standing.level = credit.level;
                }
            }
        }

        Ok(())
    }
}
