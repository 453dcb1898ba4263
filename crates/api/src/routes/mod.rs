//! HTTP route handlers.

pub mod health;
pub mod integrations;
pub mod queue;
