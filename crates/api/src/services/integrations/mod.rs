//! HTTP adapters for the supported external systems.

pub mod bitrix24;
mod http;
pub mod one_c;

use std::sync::Arc;
use std::time::Duration;

use domain::models::{IntegrationConfig, IntegrationKind};
use domain::services::{AdapterFactory, ExternalSystemAdapter, SyncError};

pub use bitrix24::Bitrix24Adapter;
pub use one_c::OneCAdapter;

/// Builds a fresh HTTP adapter for every sync run or connection test.
#[derive(Debug, Clone)]
pub struct HttpAdapterFactory {
    default_timeout: Duration,
}

impl HttpAdapterFactory {
    /// `default_timeout` applies to integrations without `options.timeout_secs`.
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn build(
        &self,
        config: &IntegrationConfig,
    ) -> Result<Arc<dyn ExternalSystemAdapter>, SyncError> {
        let adapter: Arc<dyn ExternalSystemAdapter> = match config.kind {
            IntegrationKind::Bitrix24 => {
                Arc::new(Bitrix24Adapter::new(config, self.default_timeout)?)
            }
            IntegrationKind::OneC => Arc::new(OneCAdapter::new(config, self.default_timeout)?),
        };
        Ok(adapter)
    }
}
