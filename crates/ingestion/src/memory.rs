//! In-memory partitioned log
//!
//! Used by tests that run without a Kafka cluster. The broker keeps
//! committed offsets per consumer group, so a fresh client created from the
//! same broker behaves like a restarted process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{ContractError, IngestRecord, LogClient, RecordHandle};
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::pending::PendingRecord;

#[derive(Debug, Clone)]
struct StoredMessage {
    key: Option<String>,
    value: String,
}

/// One successful commit observed by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedOffset {
    pub group: String,
    pub topic: String,
    pub partition: i32,
    /// Next offset to read (Kafka convention: last processed + 1)
    pub next_offset: i64,
}

#[derive(Debug, Default)]
struct BrokerState {
    /// topic -> partitions -> messages
    topics: HashMap<String, Vec<Vec<StoredMessage>>>,
    /// (group, topic, partition) -> next offset to read
    committed: HashMap<(String, String, i32), i64>,
    commit_log: Vec<CommittedOffset>,
    fail_polls: u32,
    fail_commits: u32,
}

/// Shared in-memory broker
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    produced: Arc<Notify>,
}

impl MemoryBroker {
    /// Empty broker without topics
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `topic` with `partitions` partitions (no-op if it exists)
    pub fn create_topic(&self, topic: &str, partitions: usize) {
        self.state()
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions.max(1)]);
    }

    /// Append a message and return its offset
    ///
    /// Creates a single-partition topic on first use. Partitions beyond the
    /// current count are added.
    pub fn produce(&self, topic: &str, partition: i32, key: Option<&str>, value: &str) -> i64 {
        let offset = {
            let mut state = self.state();
            let partitions = state.topics.entry(topic.to_string()).or_default();
            let index = partition.max(0) as usize;
            if partitions.len() <= index {
                partitions.resize_with(index + 1, Vec::new);
            }
            partitions[index].push(StoredMessage {
                key: key.map(str::to_string),
                value: value.to_string(),
            });
            partitions[index].len() as i64 - 1
        };
        self.produced.notify_waiters();
        offset
    }

    /// Next offset to read for the group, if it ever committed
    pub fn committed(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        self.state()
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// Every successful commit, in order
    pub fn commit_log(&self) -> Vec<CommittedOffset> {
        self.state().commit_log.clone()
    }

    /// Make the next `n` polls (any client) fail
    pub fn fail_next_polls(&self, n: u32) {
        self.state().fail_polls = n;
    }

    /// Make the next `n` commits (any client) fail
    pub fn fail_next_commits(&self, n: u32) {
        self.state().fail_commits = n;
    }

    /// Create a consumer for `group`
    pub fn client(&self, group: impl Into<String>) -> MemoryLogClient {
        MemoryLogClient {
            name: "memory".to_string(),
            broker: self.clone(),
            group: group.into(),
            topic: None,
            positions: HashMap::new(),
            pending: PendingRecord::default(),
            next_partition: 0,
            closed: false,
        }
    }

    fn fetch(&self, group: &str, topic: &str, client: &mut MemoryLogClient) -> Option<IngestRecord> {
        let state = self.state();
        let partitions = state.topics.get(topic)?;
        let count = partitions.len();

        for step in 0..count {
            let partition = (client.next_partition + step) % count;
            let partition_id = partition as i32;
            let position = *client.positions.entry(partition_id).or_insert_with(|| {
                state
                    .committed
                    .get(&(group.to_string(), topic.to_string(), partition_id))
                    .copied()
                    .unwrap_or(0)
            });

            if let Some(message) = partitions[partition].get(position as usize) {
                client.positions.insert(partition_id, position + 1);
                client.next_partition = (partition + 1) % count;
                return Some(IngestRecord::new(
                    topic,
                    RecordHandle::new(partition_id, position),
                    message.key.clone(),
                    message.value.clone(),
                ));
            }
        }
        None
    }
}

/// Consumer handle on a [`MemoryBroker`]
///
/// Starts each partition at the group's committed offset (earliest when
/// nothing was committed) and redelivers the last unreleased record.
#[derive(Debug)]
pub struct MemoryLogClient {
    name: String,
    broker: MemoryBroker,
    group: String,
    topic: Option<String>,
    /// partition -> next offset this client reads
    positions: HashMap<i32, i64>,
    /// delivered but not yet released
    pending: PendingRecord,
    next_partition: usize,
    closed: bool,
}

impl MemoryLogClient {
    /// Consumer group this client commits for
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn take_injected_poll_failure(&self) -> bool {
        let mut state = self.broker.state();
        if state.fail_polls > 0 {
            state.fail_polls -= 1;
            true
        } else {
            false
        }
    }

    fn next_record(&mut self, topic: &str) -> Option<IngestRecord> {
        let broker = self.broker.clone();
        let group = self.group.clone();
        broker.fetch(&group, topic, self)
    }
}

impl LogClient for MemoryLogClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), ContractError> {
        if !self.broker.state().topics.contains_key(topic) {
            return Err(ContractError::subscribe(topic, "unknown topic"));
        }
        self.topic = Some(topic.to_string());
        self.positions.clear();
        self.pending.clear();
        debug!(group = %self.group, topic = %topic, "memory client subscribed");
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<IngestRecord>, ContractError> {
        if self.closed {
            return Err(ContractError::poll("client closed"));
        }
        let topic = self
            .topic
            .clone()
            .ok_or_else(|| ContractError::poll("poll before subscribe"))?;

        if self.take_injected_poll_failure() {
            return Err(ContractError::poll("broker unavailable"));
        }

        if let Some(record) = self.pending.redeliver() {
            trace!(handle = %record.handle, "redelivering unreleased record");
            return Ok(Some(record));
        }

        let produced = self.broker.produced.clone();
        let notified = produced.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let record = match self.next_record(&topic) {
            Some(record) => Some(record),
            None => match tokio::time::timeout(timeout, notified).await {
                Ok(()) => self.next_record(&topic),
                Err(_) => None,
            },
        };

        if let Some(record) = &record {
            self.pending.hold(record);
        }
        Ok(record)
    }

    fn release(&mut self, handle: &RecordHandle) {
        self.pending.release(handle);
    }

    async fn commit(&mut self, record: &IngestRecord) -> Result<(), ContractError> {
        let mut state = self.broker.state();
        if state.fail_commits > 0 {
            state.fail_commits -= 1;
            return Err(ContractError::commit(
                &record.topic,
                record.partition(),
                record.offset(),
                "broker unavailable",
            ));
        }

        let next_offset = record.offset() + 1;
        state.committed.insert(
            (self.group.clone(), record.topic.clone(), record.partition()),
            next_offset,
        );
        state.commit_log.push(CommittedOffset {
            group: self.group.clone(),
            topic: record.topic.clone(),
            partition: record.partition(),
            next_offset,
        });
        drop(state);

        self.pending.release(&record.handle);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.closed = true;
        self.pending.clear();
        debug!(group = %self.group, "memory client closed");
        Ok(())
    }
}
