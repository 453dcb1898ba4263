use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use erp_sync_api::app::{self, AppState, SyncServices};
use erp_sync_api::config::Config;
use erp_sync_api::jobs::{JobScheduler, PoolMetricsJob, SyncQueueJob};
use erp_sync_api::middleware::{init_metrics, logging::init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging)?;

    info!("Starting ERP sync service v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = init_metrics() {
        warn!(error = %e, "Prometheus recorder not installed, /metrics disabled");
    }

    // Create database pool
    let pool = persistence::db::create_pool(&config.database_config()).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let addr = config.socket_addr()?;
    let queue_interval = config.sync.queue_interval_secs;
    let services = SyncServices::postgres(&pool, &config);
    let state = AppState::new(config, pool.clone(), services);

    // Background jobs
    let mut scheduler = JobScheduler::new();
    scheduler.register(SyncQueueJob::new(state.queue.clone(), queue_interval));
    scheduler.register(PoolMetricsJob::new(pool));
    scheduler.start();

    let app = app::create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(30)).await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
