//! Error type shared by the catalog, bridge and configuration layers.

use thiserror::Error;

/// Errors raised inside the router. Detection and normalization never return these;
/// the execution bridge folds them into an [`crate::ExecutionOutcome`].
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("capability factory '{capability_id}' failed: {message}")]
    Factory {
        capability_id: String,
        message: String,
    },
    #[error("{0}")]
    Execution(String),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
