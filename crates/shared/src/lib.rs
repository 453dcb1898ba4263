//! Shared utilities and common types for the ERP sync backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Hashing and secret handling for the admin API key and stored credentials
//! - Limit/offset pagination for list endpoints
//! - Field validation (tax codes, connection URLs)

pub mod crypto;
pub mod pagination;
pub mod validation;
