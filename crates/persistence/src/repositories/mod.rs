//! Repository implementations for database operations.
//!
//! Each repository implements the matching domain store trait.

pub mod client;
pub mod entity_mapping;
pub mod integration;
pub mod sync_log;
pub mod sync_queue;

pub use client::ClientRepository;
pub use entity_mapping::EntityMappingRepository;
pub use integration::IntegrationRepository;
pub use sync_log::SyncLogRepository;
pub use sync_queue::SyncQueueRepository;

use domain::services::SyncError;

/// PostgreSQL unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION))
}

pub(crate) fn storage_error(err: sqlx::Error) -> SyncError {
    tracing::error!(error = %err, "Database error");
    SyncError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_keeps_message() {
        let err = storage_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, SyncError::Storage(ref m) if m.contains("no rows")));
    }

    #[test]
    fn test_row_not_found_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
