//! LogClient trait - consumer side of the partitioned log

use std::time::Duration;

use crate::{ContractError, IngestRecord, RecordHandle};

/// Log consumer with manual, cumulative offset management
///
/// # Redelivery
/// A record returned by [`poll`](LocalLogClient::poll) must be returned again
/// by the next poll, before any later record, until it is released or its
/// commit succeeds. The loop releases a record as soon as it was written, so
/// only failed writes are redelivered. A failed commit does not cause a
/// second write; the next successful commit of the partition covers it.
///
/// # Commit
/// Committing a record acknowledges it and every earlier offset of the same
/// partition for the configured consumer group.
#[trait_variant::make(LogClient: Send)]
pub trait LocalLogClient {
    /// Client name (used for logging)
    fn name(&self) -> &str;

    /// Join the consumer group and subscribe to `topic`
    async fn subscribe(&mut self, topic: &str) -> Result<(), ContractError>;

    /// Wait up to `timeout` for the next record
    ///
    /// `Ok(None)` means the wait elapsed without a record.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<IngestRecord>, ContractError>;

    /// Stop redelivering the record at `handle`
    fn release(&mut self, handle: &RecordHandle);

    /// Commit the record's offset (cumulative)
    async fn commit(&mut self, record: &IngestRecord) -> Result<(), ContractError>;

    /// Leave the group and release the connection
    async fn close(&mut self) -> Result<(), ContractError>;
}
