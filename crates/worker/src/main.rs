use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assetdesk_core::clock::{Clock, SystemClock};
use assetdesk_core::services::{MaintenanceScheduler, ReportAggregator};
use assetdesk_core::store::Store;
use assetdesk_db::PgStore;
use assetdesk_worker::config::{LogFormat, WorkerConfig};
use assetdesk_worker::jobs;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().expect("Invalid worker configuration");
    init_tracing(config.log_format);

    tracing::info!(
        scheduler_tick_secs = config.scheduler_tick.as_secs(),
        report_interval_secs = config.report_interval.as_secs(),
        "Worker starting"
    );

    // --- Database ---
    let pool = assetdesk_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to connect to database");
    assetdesk_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    assetdesk_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Services ---
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = MaintenanceScheduler::new(Arc::clone(&store), Arc::clone(&clock));
    let reports = ReportAggregator::new(store, clock);

    // --- Jobs ---
    let cancel = CancellationToken::new();
    let handles = jobs::spawn_all(scheduler, reports, &config, &cancel);

    shutdown_signal().await;

    cancel.cancel();
    for handle in handles {
        if tokio::time::timeout(config.shutdown_timeout, handle).await.is_err() {
            tracing::warn!("Job did not stop within the shutdown timeout");
        }
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "assetdesk_worker=debug,assetdesk_core=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
