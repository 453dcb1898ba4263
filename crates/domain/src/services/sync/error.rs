//! Error taxonomy for adapters and the synchronization engine.

use thiserror::Error;

use crate::models::EntityType;

/// Boxed source error carried by adapter failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Normalized failure of an external system call.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Credentials rejected, or a token refresh failed.
    #[error("authentication failed: {message}")]
    Auth {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("not found: {message}")]
    NotFound {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Timeout or transport failure.
    #[error("connectivity error: {message}")]
    Connectivity {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Non-success response or malformed body.
    #[error("remote error{}: {message}", http_status(.status))]
    Remote {
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

fn http_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl AdapterError {
    pub fn auth(message: impl Into<String>) -> Self {
        AdapterError::Auth {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AdapterError::NotFound {
            message: message.into(),
            source: None,
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        AdapterError::Connectivity {
            message: message.into(),
            source: None,
        }
    }

    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        AdapterError::Remote {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying error.
    pub fn with_source(mut self, err: impl Into<BoxError>) -> Self {
        let slot = match &mut self {
            AdapterError::Auth { source, .. }
            | AdapterError::NotFound { source, .. }
            | AdapterError::Connectivity { source, .. }
            | AdapterError::Remote { source, .. } => source,
        };
        *slot = Some(err.into());
        self
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::Auth { .. } => "auth",
            AdapterError::NotFound { .. } => "not_found",
            AdapterError::Connectivity { .. } => "connectivity",
            AdapterError::Remote { .. } => "remote",
        }
    }
}

/// Errors raised by the engine, the queue processor and the stores they use.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("integration {0} not found")]
    IntegrationNotFound(i64),

    #[error("unsupported integration: {0}")]
    UnsupportedIntegration(String),

    #[error("integration {0} is inactive")]
    IntegrationInactive(i64),

    #[error("duplicate mapping for integration {integration_id} {entity_type} local id {local_id} / external id {external_id}")]
    DuplicateMapping {
        integration_id: i64,
        entity_type: EntityType,
        local_id: i64,
        external_id: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("mapping error: {0}")]
    Mapping(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("unknown sync operation: {0}")]
    UnknownOperation(String),

    #[error("{failed} of {processed} records failed")]
    RecordsFailed { failed: i32, processed: i32 },
}

impl SyncError {
    /// Whether a queue item failing with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::UnknownOperation(_))
    }
}
