//! Domain layer for the ERP sync backend.
//!
//! This crate contains:
//! - Domain models (Client, IntegrationConfig, EntityMapping, SyncLog, SyncQueueItem)
//! - The synchronization engine, entity mappers and queue processor
//! - Collaborator traits implemented by the persistence and API crates

pub mod models;
pub mod services;
