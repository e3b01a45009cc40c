// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use api::{Exchange, KrakenClient};
pub use config::Settings;
pub use error::{ComputationError, CycleError, KrakenError};
pub use models::*;
pub use strategy::Strategy;
