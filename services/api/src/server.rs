use crate::cli::ServeArgs;
use crate::infra::{load_protocols, AppState, InMemoryPatientRepository, InMemoryProtocolRepository};
use crate::routes::with_matching_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use oncomatch::config::AppConfig;
use oncomatch::error::AppError;
use oncomatch::matching::{MatchingEngine, ProtocolMatchingService};
use oncomatch::telemetry;
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
    if let Some(path) = args.catalog.take() {
        config.matching.catalog_path = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let protocols = load_protocols(config.matching.catalog_path.as_deref())?;
    let repository = Arc::new(InMemoryProtocolRepository::new(protocols));
    let catalog_size = repository.len();
    let engine = Arc::new(MatchingEngine::new(repository, config.matching.settings()));
    let matching_service = Arc::new(ProtocolMatchingService::new(
        engine,
        Arc::new(InMemoryPatientRepository::default()),
    ));

    let app = with_matching_routes(matching_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        protocols = catalog_size,
        condition_mode = ?config.matching.condition_mode,
        "protocol matching service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
