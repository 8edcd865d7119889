//! # Sinks
//!
//! Record persistence module.
//!
//! Responsibilities:
//! - Write one `IngestRecord` as one row
//! - Report the result as a `PersistOutcome`; store errors never propagate
//! - Use a dedicated transaction per write

pub mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use contracts::{PersistOutcome, RecordSink};
pub use error::SinkError;
pub use memory::{MemorySink, MemoryTable, StoredRow, WriteGate};
#[cfg(feature = "postgres")]
pub use postgres::PgSink;
