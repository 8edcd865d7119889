//! IngestRecord - one decoded log record

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a record inside the log
///
/// Owned by the log client; the rest of the pipeline treats it as opaque
/// apart from logging and commit-pointer bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordHandle {
    /// Partition number
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
}

impl RecordHandle {
    pub fn new(partition: i32, offset: i64) -> Self {
        Self { partition, offset }
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}

/// A record polled from the log, ready to be persisted
///
/// Lives for exactly one loop iteration: materialized by poll, borrowed by
/// the sink, dropped after the commit decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRecord {
    /// Source topic
    pub topic: String,

    /// Partition/offset handle
    pub handle: RecordHandle,

    /// Message key (absent keys stay `None`)
    pub key: Option<String>,

    /// Message payload as UTF-8 text
    pub value: String,
}

impl IngestRecord {
    pub fn new(
        topic: impl Into<String>,
        handle: RecordHandle,
        key: Option<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            handle,
            key,
            value: value.into(),
        }
    }

    pub fn partition(&self) -> i32 {
        self.handle.partition
    }

    pub fn offset(&self) -> i64 {
        self.handle.offset
    }

    /// Key for display purposes (`N/A` when absent)
    pub fn key_display(&self) -> &str {
        self.key.as_deref().unwrap_or("N/A")
    }
}
