//! Layered error definitions
//!
//! Categorized by source: config / log / store

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Log Errors =====
    /// Consumer creation or subscription failed
    #[error("subscribe to '{topic}' failed: {message}")]
    Subscribe { topic: String, message: String },

    /// Poll failed (broker unreachable, consumer error)
    #[error("poll error: {message}")]
    Poll { message: String },

    /// Offset commit failed
    #[error("commit of {topic}[{partition}]@{offset} failed: {message}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        message: String,
    },

    // ===== Store Errors =====
    /// Store connection error (startup only)
    #[error("store '{sink_name}' connection error: {message}")]
    StoreConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create subscribe error
    pub fn subscribe(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create poll error
    pub fn poll(message: impl Into<String>) -> Self {
        Self::Poll {
            message: message.into(),
        }
    }

    /// Create commit error for the given record position
    pub fn commit(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        message: impl Into<String>,
    ) -> Self {
        Self::Commit {
            topic: topic.into(),
            partition,
            offset,
            message: message.into(),
        }
    }

    /// Create store connection error
    pub fn store_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
