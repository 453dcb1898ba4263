//! Services used by the HTTP layer and background jobs.

pub mod integrations;
