//! MemorySink - in-process table
//!
//! Stands in for the relational store in tests. Supports
//! failure injection and holding writes in flight.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{IngestRecord, PersistOutcome, RecordSink};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, instrument};

/// One stored row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: u64,
    pub topic: String,
    pub message_key: Option<String>,
    pub message_value: String,
}

/// Shared row storage
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: Arc<Mutex<Vec<StoredRow>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredRow>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, record: &IngestRecord) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().push(StoredRow {
            id,
            topic: record.topic.clone(),
            message_key: record.key.clone(),
            message_value: record.value.clone(),
        });
        id
    }

    /// Snapshot of all rows in insertion order
    pub fn rows(&self) -> Vec<StoredRow> {
        self.lock().clone()
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Rows equal to `(topic, key, value)`
    pub fn count_matching(&self, topic: &str, key: Option<&str>, value: &str) -> usize {
        self.lock()
            .iter()
            .filter(|row| {
                row.topic == topic && row.message_key.as_deref() == key && row.message_value == value
            })
            .count()
    }
}

/// Holds sink writes until released
///
/// Each write signals `entered` and then waits for one permit.
#[derive(Debug, Clone)]
pub struct WriteGate {
    permits: Arc<Semaphore>,
    entered: Arc<Notify>,
}

impl WriteGate {
    fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
            entered: Arc::new(Notify::new()),
        }
    }

    /// Wait until a write is parked at the gate
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let `n` writes through
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    async fn pass(&self) -> bool {
        self.entered.notify_one();
        match self.permits.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }
}

/// Sink writing into a [`MemoryTable`]
#[derive(Debug, Clone)]
pub struct MemorySink {
    name: String,
    table: MemoryTable,
    fail_next: Arc<AtomicU32>,
    fail_all: Arc<AtomicBool>,
    gate: Option<WriteGate>,
}

impl MemorySink {
    /// Sink with a fresh empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_table(name, MemoryTable::new())
    }

    /// Sink sharing an existing table (e.g. across simulated restarts)
    pub fn with_table(name: impl Into<String>, table: MemoryTable) -> Self {
        Self {
            name: name.into(),
            table,
            fail_next: Arc::default(),
            fail_all: Arc::default(),
            gate: None,
        }
    }

    /// Table this sink writes into
    pub fn table(&self) -> &MemoryTable {
        &self.table
    }

    /// Fail the next `n` writes
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every write until switched off
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Park every write at a gate; returns the gate's handle
    pub fn hold_writes(&mut self) -> WriteGate {
        let gate = WriteGate::new();
        self.gate = Some(gate.clone());
        gate
    }

    fn take_injected_failure(&self) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl RecordSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "memory_sink_persist",
        skip(self, record),
        fields(sink = %self.name, handle = %record.handle)
    )]
    async fn persist(&mut self, record: &IngestRecord) -> PersistOutcome {
        if let Some(gate) = &self.gate {
            if !gate.pass().await {
                return PersistOutcome::failure("write gate closed");
            }
        }

        if self.take_injected_failure() {
            return PersistOutcome::failure("injected store failure");
        }

        let id = self.table.insert(record);
        debug!(row_id = id, "row stored");
        PersistOutcome::Success
    }

    async fn close(&mut self) {
        debug!(sink = %self.name, rows = self.table.len(), "MemorySink closed");
    }
}
