use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use domain::services::QueueSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// SHA-256 hex digest of the admin API key expected in `X-API-Key`.
    #[serde(default)]
    pub admin_api_key_hash: String,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// How often the background job drains the sync queue.
    #[serde(default = "default_queue_interval")]
    pub queue_interval_secs: u64,

    /// Queue items fetched per round.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Queue items processed at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-call timeout for external systems without their own setting.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Per-record errors kept in a sync log and returned by the API.
    #[serde(default = "default_max_reported_errors")]
    pub max_reported_errors: usize,

    /// Queue items whose worker stopped refreshing them for this long are
    /// picked up again. Running items are refreshed every third of it.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    120
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_queue_interval() -> u64 {
    60
}
fn default_batch_size() -> i64 {
    50
}
fn default_max_concurrency() -> usize {
    4
}
fn default_http_timeout() -> u64 {
    30
}
fn default_max_reported_errors() -> usize {
    10
}
fn default_stale_after() -> u64 {
    1800
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with ERP_SYNC__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("ERP_SYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on the working directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 120

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            admin_api_key_hash = ""
            cors_origins = []

            [sync]
            queue_interval_secs = 60
            batch_size = 50
            max_concurrency = 4
            http_timeout_secs = 30
            max_reported_errors = 10
            stale_after_secs = 1800
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // Validation is left to the caller so partial configs can be inspected
        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "ERP_SYNC__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        let hash = &self.security.admin_api_key_hash;
        if hash.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "ERP_SYNC__SECURITY__ADMIN_API_KEY_HASH must be set".to_string(),
            ));
        }
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigValidationError::InvalidValue(
                "admin_api_key_hash must be a SHA-256 hex digest".to_string(),
            ));
        }

        let sync = &self.sync;
        if sync.queue_interval_secs == 0 || sync.http_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "sync intervals and timeouts must be greater than 0".to_string(),
            ));
        }
        if sync.stale_after_secs < 3 {
            return Err(ConfigValidationError::InvalidValue(
                "sync stale_after_secs must be at least 3".to_string(),
            ));
        }
        if sync.batch_size <= 0 || sync.max_concurrency == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "sync batch_size and max_concurrency must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    /// Pool settings for the persistence crate.
    pub fn database_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            idle_timeout_secs: self.database.idle_timeout_secs,
        }
    }
}

impl SyncConfig {
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            batch_size: self.batch_size,
            max_concurrency: self.max_concurrency,
            stale_after: chrono::Duration::seconds(self.stale_after_secs as i64),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
