//! # Ingestion
//!
//! At-least-once ingestion loop.
//!
//! Responsibilities:
//! - Poll the log client for the next record
//! - Hand each record to a `RecordSink`, one at a time
//! - Commit the record's offset only after the sink reported success
//! - Leave failed records uncommitted so the log redelivers them
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionLoop, LoopConfig, MemoryBroker};
//!
//! let broker = MemoryBroker::new();
//! broker.create_topic("orders", 1);
//! broker.produce("orders", 0, Some("42"), r#"{"amt":10}"#);
//!
//! let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//! let ingest = IngestionLoop::new(broker.client("group"), sink, LoopConfig::new("orders"), stop_rx);
//! let stats = ingest.run().await?;
//! ```

mod config;
mod error;
mod ingestion_loop;
#[cfg(feature = "kafka")]
mod kafka;
mod memory;
mod pending;
mod stats;

// Re-exports
pub use config::{LoopConfig, RetryConfig};
pub use contracts::IngestRecord;
pub use error::{IngestionError, Result};
pub use ingestion_loop::{IngestionLoop, LoopState};
#[cfg(feature = "kafka")]
pub use kafka::KafkaLogClient;
pub use memory::{CommittedOffset, MemoryBroker, MemoryLogClient};
pub use stats::LoopStats;
