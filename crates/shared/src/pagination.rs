//! Limit/offset pagination utilities.

use serde::Deserialize;

/// Default page size when the caller does not specify one.
pub const DEFAULT_LIMIT: i64 = 50;

/// Upper bound on page size.
pub const MAX_LIMIT: i64 = 200;

/// Pagination query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Returns `(limit, offset)` clamped to sane bounds.
    pub fn normalized(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
