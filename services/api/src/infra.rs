use chrono::NaiveDate;
use competency_cert::config::CertificationConfig;
use competency_cert::workflows::certification::{
    CertificationSubmission, CertificationWorkflow, InMemorySubmissionRepository, RepositoryError,
    RequestContext, SnapshotFileRepository, StandingLedger, StudentId, SubmissionId,
    SubmissionRepository, WorkflowEvent,
};
use competency_cert::workflows::levels::LevelCatalog;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub(crate) type ServiceWorkflow = CertificationWorkflow<SubmissionStore, StandingLedger>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Submission storage selected from configuration.
pub(crate) enum SubmissionStore {
    Memory(InMemorySubmissionRepository),
    Snapshot(SnapshotFileRepository),
}

impl SubmissionStore {
    pub(crate) fn from_config(config: &CertificationConfig) -> Self {
        match &config.store_path {
            Some(path) => {
                info!(path = %path.display(), "using snapshot submission store");
                Self::Snapshot(SnapshotFileRepository::new(path.clone()))
            }
            None => Self::Memory(InMemorySubmissionRepository::new()),
        }
    }

    fn backend(&self) -> &dyn SubmissionRepository {
        match self {
            Self::Memory(repository) => repository,
            Self::Snapshot(repository) => repository,
        }
    }
}

impl SubmissionRepository for SubmissionStore {
    fn save(
        &self,
        ctx: &RequestContext,
        record: CertificationSubmission,
    ) -> Result<(), RepositoryError> {
        self.backend().save(ctx, record)
    }

    fn find(
        &self,
        ctx: &RequestContext,
        id: &SubmissionId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError> {
        self.backend().find(ctx, id)
    }

    fn find_by_student(
        &self,
        ctx: &RequestContext,
        student_id: &StudentId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError> {
        self.backend().find_by_student(ctx, student_id)
    }

    fn find_all(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<CertificationSubmission>, RepositoryError> {
        self.backend().find_all(ctx)
    }
}

/// Wires the engine from configuration: store backend, level catalog and standing ledger.
pub(crate) fn build_workflow(config: &CertificationConfig) -> (ServiceWorkflow, Arc<StandingLedger>) {
    let catalog = LevelCatalog::load_or_standard(config.level_bands_path.as_deref());
    for issue in catalog.issues() {
        warn!(%issue, "level catalog issue");
    }

    let ledger = Arc::new(StandingLedger::new());
    let workflow = CertificationWorkflow::with_notification_capacity(
        Arc::new(SubmissionStore::from_config(config)),
        ledger.clone(),
        catalog,
        config.notification_capacity,
    );
    (workflow, ledger)
}

/// Logs every workflow event until the engine is dropped.
pub(crate) async fn log_workflow_events(mut events: broadcast::Receiver<WorkflowEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => info!(
                submission_id = %event.submission_id,
                student_id = %event.student_id,
                status = %event.new_status,
                "certification status changed"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "notification subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
