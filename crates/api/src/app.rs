use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{
    AdapterFactory, IntegrationConfigStore, LocalEntityStore, MappingStore, QueueProcessor,
    SyncEngine, SyncLogStore, SyncQueueStore,
};
use persistence::repositories::{
    ClientRepository, EntityMappingRepository, IntegrationRepository, SyncLogRepository,
    SyncQueueRepository,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, require_admin, trace_id};
use crate::routes::{health, integrations, queue};
use crate::services::integrations::HttpAdapterFactory;

/// Stores and the adapter factory the engine runs on.
#[derive(Clone)]
pub struct SyncServices {
    pub integrations: Arc<dyn IntegrationConfigStore>,
    pub clients: Arc<dyn LocalEntityStore>,
    pub mappings: Arc<dyn MappingStore>,
    pub logs: Arc<dyn SyncLogStore>,
    pub queue: Arc<dyn SyncQueueStore>,
    pub adapters: Arc<dyn AdapterFactory>,
}

impl SyncServices {
    /// PostgreSQL repositories with HTTP adapters.
    pub fn postgres(pool: &PgPool, config: &Config) -> Self {
        Self {
            integrations: Arc::new(IntegrationRepository::new(pool.clone())),
            clients: Arc::new(ClientRepository::new(pool.clone())),
            mappings: Arc::new(EntityMappingRepository::new(pool.clone())),
            logs: Arc::new(SyncLogRepository::new(pool.clone())),
            queue: Arc::new(SyncQueueRepository::new(pool.clone())),
            adapters: Arc::new(HttpAdapterFactory::new(config.sync.http_timeout())),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub engine: Arc<SyncEngine>,
    pub queue: QueueProcessor,
    pub integrations: Arc<dyn IntegrationConfigStore>,
    pub logs: Arc<dyn SyncLogStore>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, services: SyncServices) -> Self {
        let engine = Arc::new(
            SyncEngine::new(
                services.integrations.clone(),
                services.clients,
                services.mappings,
                services.logs.clone(),
                services.adapters,
            )
            .with_max_logged_errors(config.sync.max_reported_errors),
        );
        let queue = QueueProcessor::new(
            engine.clone(),
            services.queue,
            config.sync.queue_settings(),
        );

        Self {
            pool,
            config: Arc::new(config),
            engine,
            queue,
            integrations: services.integrations,
            logs: services.logs,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Management routes (require the admin API key)
    let admin_routes = Router::new()
        .route(
            "/api/v1/integrations",
            post(integrations::create_integration).get(integrations::list_integrations),
        )
        .route("/api/v1/integrations/:id", get(integrations::get_integration))
        .route(
            "/api/v1/integrations/:id/test",
            post(integrations::test_connection),
        )
        .route(
            "/api/v1/integrations/:id/sync/clients",
            post(integrations::sync_clients),
        )
        .route("/api/v1/integrations/:id/queue", post(integrations::enqueue_sync))
        .route("/api/v1/integrations/:id/logs", get(integrations::list_sync_logs))
        .route("/api/v1/queue/process", post(queue::process_queue))
        .route("/api/v1/queue/:item_id", get(queue::get_queue_item))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
