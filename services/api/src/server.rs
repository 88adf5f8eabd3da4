use crate::cli::ServeArgs;
use crate::infra::{seed_demo_cycle, AppState, InMemoryNominationRepository, LoggingDecisionNotifier};
use crate::routes::with_nomination_routes;
use awards::config::AppConfig;
use awards::error::AppError;
use awards::telemetry;
use awards::workflows::nominations::NominationApprovalService;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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

    let repository = Arc::new(InMemoryNominationRepository::default());
    if args.seed_demo {
        let cycle_id = seed_demo_cycle(&repository)?;
        info!(cycle = %cycle_id.0, "seeded demo cycle");
    }
    let notifier = Arc::new(LoggingDecisionNotifier::default());
    let approval_service = Arc::new(NominationApprovalService::new(
        repository,
        notifier,
        config.rating.aggregator(),
    ));

    let app = with_nomination_routes(approval_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        rating_scale = config.rating.scale,
        "awards service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
