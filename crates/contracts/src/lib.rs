//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the ingestion bridge.
//! Business crates depend only on this crate, never on each other's internals.
//!
//! ## Delivery model
//! - A record is polled from the log, persisted by a sink, then committed
//! - Commits are cumulative: committing offset N acknowledges every offset <= N
//!   of the same partition
//! - Records that were delivered but not committed are redelivered

mod commit_pointer;
mod config;
mod error;
mod log_client;
mod record;
mod sink;

pub use commit_pointer::CommitPointer;
pub use config::*;
pub use error::*;
pub use log_client::{LocalLogClient, LogClient};
pub use record::{IngestRecord, RecordHandle};
pub use sink::{LocalRecordSink, PersistOutcome, RecordSink};
