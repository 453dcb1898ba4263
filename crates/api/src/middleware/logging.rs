//! Logging initialization.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Output format selected by `logging.format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with the enclosing span fields.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl LogFormat {
    /// Unknown values fall back to pretty output.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the configured level. Sync runs and queue items log
/// inside spans, so `run_id`, `integration_id` and `queue_item_id` appear on
/// every event they emit.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match LogFormat::parse(&config.format) {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_span_events(FmtSpan::CLOSE))
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    }
}
