//! IngestionLoop - poll, persist, commit
//!
//! One record is in flight at a time. The loop moves through
//! `Polling -> Persisting -> Deciding -> Polling` until a shutdown request is
//! observed at the top of `Polling`, then enters `ShuttingDown`.
//!
//! Offsets are committed only after the sink reports success. A failed write
//! leaves the record unreleased; the log client hands it out again on the
//! next poll, so nothing is skipped. A written record is released before its
//! commit, so a failed commit never writes the row twice. A crash between
//! write and commit causes a duplicate row on restart, never a lost one.

use std::time::{Duration, Instant};

use contracts::{CommitPointer, IngestRecord, LogClient, PersistOutcome, RecordSink};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::LoopConfig;
use crate::error::{IngestionError, Result};
use crate::stats::LoopStats;

/// Loop state
#[derive(Debug)]
pub enum LoopState {
    /// Waiting (bounded) for the next record
    Polling,
    /// Handing a record to the sink
    Persisting(IngestRecord),
    /// Committing or skipping the commit
    Deciding {
        record: IngestRecord,
        outcome: PersistOutcome,
    },
    /// Terminal state
    ShuttingDown,
}

/// Single-consumer at-least-once ingestion loop
pub struct IngestionLoop<C, S> {
    client: C,
    sink: S,
    config: LoopConfig,
    shutdown: watch::Receiver<bool>,
    pointer: CommitPointer,
    stats: LoopStats,
    consecutive_failures: u32,
}

impl<C, S> IngestionLoop<C, S>
where
    C: LogClient + Send,
    S: RecordSink + Send,
{
    /// Create a loop
    ///
    /// `shutdown` flips to `true` to request a graceful stop.
    pub fn new(client: C, sink: S, config: LoopConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            client,
            sink,
            config,
            shutdown,
            pointer: CommitPointer::new(),
            stats: LoopStats::default(),
            consecutive_failures: 0,
        }
    }

    /// Subscribe and run until shutdown
    ///
    /// # Errors
    /// Only a failed subscription is returned; every runtime fault is logged
    /// and absorbed by the loop.
    #[instrument(
        name = "ingestion_loop_run",
        skip(self),
        fields(topic = %self.config.topic, client = %self.client.name(), sink = %self.sink.name())
    )]
    pub async fn run(mut self) -> Result<LoopStats> {
        self.client
            .subscribe(&self.config.topic)
            .await
            .map_err(|source| IngestionError::Subscribe {
                topic: self.config.topic.clone(),
                source,
            })?;

        info!(
            poll_timeout_ms = self.config.poll_timeout.as_millis() as u64,
            max_records = ?self.config.max_records,
            "Ingestion loop started"
        );

        let started = Instant::now();
        let mut state = LoopState::Polling;
        loop {
            state = match state {
                LoopState::Polling => self.poll_once().await,
                LoopState::Persisting(record) => self.persist(record).await,
                LoopState::Deciding { record, outcome } => self.decide(record, outcome).await,
                LoopState::ShuttingDown => break,
            };
        }

        self.shut_down().await;

        self.stats.duration = started.elapsed();
        self.stats.commit_pointer = self.pointer;
        info!(
            received = self.stats.records_received,
            persisted = self.stats.persisted,
            persist_failures = self.stats.persist_failures,
            commit_failures = self.stats.commit_failures,
            "Ingestion loop stopped"
        );
        Ok(self.stats)
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_records
            .is_some_and(|max| self.stats.records_received >= max)
    }

    async fn poll_once(&mut self) -> LoopState {
        if self.shutdown_requested() {
            info!("Shutdown requested");
            return LoopState::ShuttingDown;
        }
        if self.limit_reached() {
            info!(records = self.stats.records_received, "Record limit reached");
            return LoopState::ShuttingDown;
        }

        match self.client.poll(self.config.poll_timeout).await {
            Ok(Some(record)) => {
                self.stats.records_received += 1;
                observability::record_record_polled(&record.topic);
                info!(
                    topic = %record.topic,
                    partition = record.partition(),
                    offset = record.offset(),
                    key = %record.key_display(),
                    "Consumed record"
                );
                debug!(value = %record.value, "Record payload");
                LoopState::Persisting(record)
            }
            Ok(None) => {
                self.stats.idle_polls += 1;
                observability::record_idle_poll();
                trace!("Poll timed out without a record");
                LoopState::Polling
            }
            Err(e) => {
                self.stats.poll_errors += 1;
                observability::record_poll_error();
                warn!(error = %e, "Poll failed, retrying");
                self.pause(self.config.poll_timeout).await;
                LoopState::Polling
            }
        }
    }

    async fn persist(&mut self, record: IngestRecord) -> LoopState {
        let outcome = self.sink.persist(&record).await;
        observability::record_persist(self.sink.name(), outcome.is_success());
        LoopState::Deciding { record, outcome }
    }

    async fn decide(&mut self, record: IngestRecord, outcome: PersistOutcome) -> LoopState {
        match outcome {
            PersistOutcome::Success => {
                self.stats.persisted += 1;
                self.consecutive_failures = 0;
                self.client.release(&record.handle);
                self.commit(&record).await;
            }
            PersistOutcome::Failure { reason } => {
                self.stats.persist_failures += 1;
                warn!(
                    topic = %record.topic,
                    partition = record.partition(),
                    offset = record.offset(),
                    reason = %reason,
                    "Record not committed, will be redelivered"
                );
                let delay = self.config.retry.calculate_delay(self.consecutive_failures);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.pause(delay).await;
            }
        }
        LoopState::Polling
    }

    async fn commit(&mut self, record: &IngestRecord) {
        match self.client.commit(record).await {
            Ok(()) => {
                self.stats.commits += 1;
                observability::record_commit(true);
                if self.pointer.advance(&record.handle) {
                    observability::record_committed_offset(
                        &record.topic,
                        record.partition(),
                        record.offset(),
                    );
                }
                info!(
                    partition = record.partition(),
                    offset = record.offset(),
                    "Record persisted and offset committed"
                );
            }
            Err(e) => {
                // The row is stored; a later commit on this partition covers it.
                self.stats.commit_failures += 1;
                observability::record_commit(false);
                error!(
                    partition = record.partition(),
                    offset = record.offset(),
                    error = %e,
                    "Offset commit failed after successful write"
                );
            }
        }
    }

    /// Sleep for `delay`, waking early on shutdown
    async fn pause(&mut self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        let mut shutdown = self.shutdown.clone();
        let stop = async move {
            let closed = shutdown.wait_for(|stop| *stop).await.is_err();
            if closed {
                // sender gone: nobody can request a stop any more
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop => {}
        }
    }

    async fn shut_down(&mut self) {
        if let Err(e) = self.client.close().await {
            warn!(error = %e, "Failed to close log client");
        }
        self.sink.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::memory::MemoryBroker;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Sink returning scripted outcomes and recording what it saw
    #[derive(Clone, Default)]
    struct ScriptedSink {
        outcomes: Arc<Mutex<VecDeque<PersistOutcome>>>,
        seen: Arc<Mutex<Vec<IngestRecord>>>,
    }

    impl ScriptedSink {
        fn with_outcomes(outcomes: Vec<PersistOutcome>) -> Self {
            Self {
                outcomes: Arc::new(Mutex::new(outcomes.into())),
                seen: Arc::default(),
            }
        }

        fn seen(&self) -> Vec<IngestRecord> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl RecordSink for ScriptedSink {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn persist(&mut self, record: &IngestRecord) -> PersistOutcome {
            self.seen.lock().unwrap().push(record.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PersistOutcome::Success)
        }

        async fn close(&mut self) {}
    }

    fn test_config(topic: &str) -> LoopConfig {
        LoopConfig::new(topic)
            .with_poll_timeout(Duration::from_millis(10))
            .with_retry(RetryConfig::disabled())
    }

    #[tokio::test]
    async fn test_failure_is_not_committed() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, None, "a");
        let sink = ScriptedSink::with_outcomes(vec![PersistOutcome::failure("db down")]);
        let (_tx, rx) = watch::channel(false);

        let stats = IngestionLoop::new(
            broker.client("g"),
            sink.clone(),
            test_config("orders").with_max_records(1),
            rx,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.persist_failures, 1);
        assert_eq!(stats.commits, 0);
        assert!(broker.commit_log().is_empty());
        assert!(stats.commit_pointer.is_empty());
    }

    #[tokio::test]
    async fn test_failed_record_is_redelivered_before_later_records() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, None, "a");
        broker.produce("orders", 0, None, "b");
        let sink = ScriptedSink::with_outcomes(vec![PersistOutcome::failure("timeout")]);
        let (_tx, rx) = watch::channel(false);

        let stats = IngestionLoop::new(
            broker.client("g"),
            sink.clone(),
            test_config("orders").with_max_records(3),
            rx,
        )
        .run()
        .await
        .unwrap();

        let offsets: Vec<i64> = sink.seen().iter().map(|r| r.offset()).collect();
        assert_eq!(offsets, vec![0, 0, 1]);
        assert_eq!(stats.persisted, 2);
        assert_eq!(stats.commit_pointer.get(0), Some(1));
        assert_eq!(broker.committed("g", "orders", 0), Some(2));
    }

    #[tokio::test]
    async fn test_idle_polls_touch_nothing() {
        let broker = MemoryBroker::new();
        broker.create_topic("orders", 1);
        let sink = ScriptedSink::default();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(
            IngestionLoop::new(broker.client("g"), sink.clone(), test_config("orders"), rx).run(),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();

        let stats = handle.await.unwrap().unwrap();
        assert!(stats.idle_polls >= 2, "idle polls: {}", stats.idle_polls);
        assert_eq!(stats.records_received, 0);
        assert!(sink.seen().is_empty());
        assert!(broker.commit_log().is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_is_not_fatal() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, None, "a");
        broker.produce("orders", 0, None, "b");
        broker.fail_next_commits(1);
        let sink = ScriptedSink::default();
        let (_tx, rx) = watch::channel(false);

        let stats = IngestionLoop::new(
            broker.client("g"),
            sink.clone(),
            test_config("orders").with_max_records(2),
            rx,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.commit_failures, 1);
        assert_eq!(stats.commits, 1);
        // record 0 is written once; the commit of record 1 covers it
        let offsets: Vec<i64> = sink.seen().iter().map(|r| r.offset()).collect();
        assert_eq!(offsets, vec![0, 1]);
        assert_eq!(broker.committed("g", "orders", 0), Some(2));
        assert_eq!(stats.commit_pointer.get(0), Some(1));
    }

    #[tokio::test]
    async fn test_broken_commits_neither_duplicate_nor_block_shutdown() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, None, "a");
        broker.fail_next_commits(1_000_000);
        let sink = ScriptedSink::default();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(
            IngestionLoop::new(broker.client("g"), sink.clone(), test_config("orders"), rx).run(),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop ignored shutdown")
            .unwrap()
            .unwrap();
        assert_eq!(sink.seen().len(), 1);
        assert_eq!(stats.records_received, 1);
        assert_eq!(stats.commit_failures, 1);
        assert!(stats.idle_polls >= 1, "idle polls: {}", stats.idle_polls);
        assert_eq!(broker.committed("g", "orders", 0), None);
    }

    #[tokio::test]
    async fn test_poll_errors_are_retried() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, Some("k"), "a");
        broker.fail_next_polls(2);
        let (_tx, rx) = watch::channel(false);

        let stats = IngestionLoop::new(
            broker.client("g"),
            ScriptedSink::default(),
            test_config("orders").with_max_records(1),
            rx,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.poll_errors, 2);
        assert_eq!(stats.commits, 1);
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_returned() {
        let broker = MemoryBroker::new();
        let (_tx, rx) = watch::channel(false);

        let result = IngestionLoop::new(
            broker.client("g"),
            ScriptedSink::default(),
            test_config("missing"),
            rx,
        )
        .run()
        .await;

        assert!(matches!(result, Err(IngestionError::Subscribe { .. })));
    }

    #[tokio::test]
    async fn test_backoff_wakes_on_shutdown() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, None, "a");
        let sink = ScriptedSink::with_outcomes(vec![PersistOutcome::failure("down")]);
        let config = LoopConfig::new("orders")
            .with_poll_timeout(Duration::from_millis(10))
            .with_retry(RetryConfig::new(Duration::from_secs(60), Duration::from_secs(60)));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(IngestionLoop::new(broker.client("g"), sink, config, rx).run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop during backoff")
            .unwrap()
            .unwrap();
        assert_eq!(stats.persist_failures, 1);
    }
}
