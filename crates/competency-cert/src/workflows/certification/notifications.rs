use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::domain::{StudentId, SubmissionId, SubmissionStatus};

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Change notice emitted after a workflow mutation commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub submission_id: SubmissionId,
    pub student_id: StudentId,
    pub new_status: SubmissionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Fan-out channel owned by a single workflow instance.
///
/// Delivery is at-most-once: publishing never blocks, subscribers that fall behind lose the
/// oldest events, and publishing without subscribers drops the event.
#[derive(Debug, Clone)]
pub struct NotificationChannel {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl NotificationChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event, returning how many subscribers it reached.
    pub fn publish(&self, event: WorkflowEvent) -> usize {
        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(broadcast::error::SendError(event)) => {
                debug!(
                    submission_id = %event.submission_id,
                    status = %event.new_status,
                    "no workflow subscribers; event dropped"
                );
                0
            }
        }
    }
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}
