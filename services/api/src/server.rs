use crate::cli::ServeArgs;
use crate::infra::{build_workflow, log_workflow_events, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use competency_cert::config::AppConfig;
use competency_cert::error::AppError;
use competency_cert::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (workflow, ledger) = build_workflow(&config.certification);
    tokio::spawn(log_workflow_events(workflow.subscribe()));
    let workflow = Arc::new(workflow);
    let workflow_subscribers = workflow.subscriber_count();

    let app = with_service_routes(workflow, ledger)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        store = ?config.certification.store_path,
        subscribers = workflow_subscribers,
        "competency certification service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
