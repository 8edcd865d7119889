//! Error types for CLI operations.

use contracts::ContractError;
use ingestion::IngestionError;
use sinks::SinkError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parsing or validation error
    #[error(transparent)]
    Config(#[from] ContractError),

    /// Store unreachable or target table unusable
    #[error("Store setup failed: {0}")]
    Store(#[from] SinkError),

    /// Log client creation or subscription error
    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),

    /// Metrics exporter could not be started
    #[error("Failed to start metrics exporter: {0}")]
    Metrics(#[source] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
