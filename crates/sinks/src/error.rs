//! Sink error types
//!
//! Only sink construction can fail with an error; writes report
//! `PersistOutcome` instead.

use thiserror::Error;

/// Sink-specific errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Table name cannot be used in a statement
    #[error("invalid table name '{table}'")]
    InvalidTable { table: String },

    /// Store unreachable or rejected the connection
    #[error("sink '{name}' failed to connect: {message}")]
    Connection { name: String, message: String },

    /// Table creation failed
    #[error("sink '{name}' failed to prepare schema: {message}")]
    Schema { name: String, message: String },
}

impl SinkError {
    /// Create a connection error
    pub fn connection(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            name: name.into(),
            message: message.into(),
        }
    }
}
