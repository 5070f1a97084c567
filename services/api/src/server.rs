use crate::cli::ServeArgs;
use crate::infra::{apply_rule_definitions, load_snapshot, open_runner, AppState, LogTransport};
use crate::routes::with_compliance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hr_compliance::clock::SystemClock;
use hr_compliance::config::AppConfig;
use hr_compliance::error::AppError;
use hr_compliance::telemetry;
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

    let snapshot = load_snapshot(args.data.as_deref())?;
    let transport = Arc::new(LogTransport::new(config.compliance.sender.clone()));
    let state_dir = args
        .state
        .take()
        .unwrap_or_else(|| config.compliance.state_dir.clone());
    let runner = open_runner(
        &config.compliance,
        &state_dir,
        snapshot,
        transport,
        Arc::new(SystemClock),
    )?;
    apply_rule_definitions(&runner, args.data.as_deref())?;
    let runner = Arc::new(runner);

    let app = with_compliance_routes(runner)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "hr compliance service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
