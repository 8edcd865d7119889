//! RecordSink trait - persistence boundary
//!
//! A sink turns one record into one durable row and reports the result as a
//! value. Store faults never escape a sink.

use std::fmt;

use crate::IngestRecord;

/// Result of persisting one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Row is durably committed
    Success,
    /// Write did not happen; the reason is human readable
    Failure { reason: String },
}

impl PersistOutcome {
    /// Failed write with a human-readable reason
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for PersistOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure { reason } => write!(f, "failure: {reason}"),
        }
    }
}

/// Persistence sink
///
/// Every call is independent: no transaction or session state is shared
/// between two `persist` calls.
#[trait_variant::make(RecordSink: Send)]
pub trait LocalRecordSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one record as one row
    ///
    /// Returns [`PersistOutcome::Success`] only after the row is committed.
    async fn persist(&mut self, record: &IngestRecord) -> PersistOutcome;

    /// Release store resources
    async fn close(&mut self);
}
