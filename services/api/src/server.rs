use crate::cli::ServeArgs;
use crate::infra::{service_directory, AppState, LogNotifier, Vault, Workflows};
use crate::routes::with_operational_routes;
use accreditation::clock::SystemClock;
use accreditation::config::AppConfig;
use accreditation::error::AppError;
use accreditation::storage::MemoryStore;
use accreditation::telemetry;
use accreditation::workflows::accreditation_router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemoryStore::open());
    let workflows = Workflows::build(
        store.clone(),
        &config.vault,
        Arc::new(LogNotifier),
        Arc::new(service_directory(config.environment, &config.directory)),
        Arc::new(SystemClock),
    );
    let sweeper = (args.sweep_interval_secs > 0).then(|| {
        spawn_sweeper(
            workflows.vault.clone(),
            Duration::from_secs(args.sweep_interval_secs),
            args.scan_limit,
        )
    });

    let app = with_operational_routes(accreditation_router(workflows.api()))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        scan_mode = ?config.vault.scan_mode,
        "accreditation service ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(readiness_flag))
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    store.close();
    info!("store closed; shutdown complete");
    Ok(())
}

fn spawn_sweeper(vault: Arc<Vault>, period: Duration, scan_limit: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match vault.sweep(scan_limit) {
                Ok(summary) => debug!(
                    purged = summary.purged,
                    scanned = summary.scanned,
                    "maintenance sweep finished"
                ),
                Err(err) => warn!(error = %err, "maintenance sweep failed"),
            }
        }
    })
}

async fn shutdown_signal(readiness: Arc<AtomicBool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    readiness.store(false, Ordering::Release);
    info!("shutdown signal received; draining connections");
}
