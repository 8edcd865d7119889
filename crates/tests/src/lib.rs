//! # Integration Tests
//!
//! Integration and end-to-end tests.
//!
//! Responsibilities:
//! - Wiring from configuration to the ingestion loop
//! - End-to-end runs on the memory broker and memory table (no Kafka or PostgreSQL)
//! - At-least-once delivery: crash window, redelivery after failure, graceful shutdown

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use ingestion::LoopConfig;
    use std::time::Duration;

    #[test]
    fn test_config_drives_loop_settings() {
        let config = ConfigLoader::load_from_str(
            r#"
[kafka]
topic = "orders"

[store]
connection_string = "postgres://ingest@localhost/ingest"

[ingest]
poll_timeout_ms = 250
retry_base_delay_ms = 0
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let loop_config = LoopConfig::from(&config);
        assert_eq!(loop_config.topic, "orders");
        assert_eq!(loop_config.poll_timeout, Duration::from_millis(250));
        assert_eq!(loop_config.retry.calculate_delay(3), Duration::ZERO);
        assert_eq!(loop_config.max_records, None);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{ContractError, IngestRecord, LogClient, RecordHandle};
    use ingestion::{IngestionLoop, LoopConfig, MemoryBroker, MemoryLogClient, RetryConfig};
    use sinks::{MemorySink, MemoryTable};
    use tokio::sync::{watch, Notify};

    const GROUP: &str = "sql-ingest-group-1";

    fn fast_config(topic: &str) -> LoopConfig {
        LoopConfig::new(topic)
            .with_poll_timeout(Duration::from_millis(10))
            .with_retry(RetryConfig::new(Duration::from_millis(5), Duration::from_millis(20)))
    }

    /// Client that checks the row exists at the moment of each commit
    struct CheckingClient {
        inner: MemoryLogClient,
        table: MemoryTable,
        row_present_at_commit: Arc<Mutex<Vec<bool>>>,
    }

    impl LogClient for CheckingClient {
        fn name(&self) -> &str {
            "checking"
        }

        async fn subscribe(&mut self, topic: &str) -> Result<(), ContractError> {
            self.inner.subscribe(topic).await
        }

        async fn poll(&mut self, timeout: Duration) -> Result<Option<IngestRecord>, ContractError> {
            self.inner.poll(timeout).await
        }

        fn release(&mut self, handle: &RecordHandle) {
            self.inner.release(handle)
        }

        async fn commit(&mut self, record: &IngestRecord) -> Result<(), ContractError> {
            let present = self.table.count_matching(
                &record.topic,
                record.key.as_deref(),
                &record.value,
            ) > 0;
            self.row_present_at_commit.lock().unwrap().push(present);
            self.inner.commit(record).await
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.inner.close().await
        }
    }

    /// Client whose commit never returns, like a process dying mid-commit
    struct HangingCommitClient {
        inner: MemoryLogClient,
        committing: Arc<Notify>,
    }

    impl LogClient for HangingCommitClient {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn subscribe(&mut self, topic: &str) -> Result<(), ContractError> {
            self.inner.subscribe(topic).await
        }

        async fn poll(&mut self, timeout: Duration) -> Result<Option<IngestRecord>, ContractError> {
            self.inner.poll(timeout).await
        }

        fn release(&mut self, handle: &RecordHandle) {
            self.inner.release(handle)
        }

        async fn commit(&mut self, _record: &IngestRecord) -> Result<(), ContractError> {
            self.committing.notify_one();
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.inner.close().await
        }
    }

    /// Produce -> loop -> table, for the record from the wire example
    #[tokio::test]
    async fn test_e2e_single_record() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, Some("warmup"), "{}");
        let table = MemoryTable::new();
        let (_tx, rx) = watch::channel(false);

        IngestionLoop::new(
            broker.client(GROUP),
            MemorySink::with_table("mem", table.clone()),
            fast_config("orders").with_max_records(1),
            rx.clone(),
        )
        .run()
        .await
        .unwrap();
        assert_eq!(broker.committed(GROUP, "orders", 0), Some(1));

        broker.produce("orders", 0, Some("42"), r#"{"amt":10}"#);
        let stats = IngestionLoop::new(
            broker.client(GROUP),
            MemorySink::with_table("mem", table.clone()),
            fast_config("orders").with_max_records(1),
            rx,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.persisted, 1);
        assert_eq!(table.count_matching("orders", Some("42"), r#"{"amt":10}"#), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(broker.committed(GROUP, "orders", 0), Some(2));
        assert_eq!(stats.commit_pointer.get(0), Some(1));
    }

    #[tokio::test]
    async fn test_commit_always_follows_persist() {
        let broker = MemoryBroker::new();
        for i in 0..5 {
            broker.produce("orders", 0, Some(&format!("k{i}")), &format!("v{i}"));
        }
        let sink = MemorySink::new("mem");
        sink.fail_next(2);
        let checks = Arc::new(Mutex::new(Vec::new()));
        let client = CheckingClient {
            inner: broker.client(GROUP),
            table: sink.table().clone(),
            row_present_at_commit: checks.clone(),
        };
        let (_tx, rx) = watch::channel(false);

        let stats = IngestionLoop::new(client, sink.clone(), fast_config("orders").with_max_records(7), rx)
            .run()
            .await
            .unwrap();

        let checks = checks.lock().unwrap().clone();
        assert_eq!(checks.len(), 5);
        assert!(checks.iter().all(|present| *present));
        assert_eq!(stats.persist_failures, 2);

        // committed offsets only ever move forward, one record at a time
        let committed: Vec<i64> = broker.commit_log().iter().map(|c| c.next_offset).collect();
        assert_eq!(committed, vec![1, 2, 3, 4, 5]);
        assert_eq!(sink.table().len(), 5);
    }

    #[tokio::test]
    async fn test_failing_store_never_advances_offset() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, None, "a");
        broker.produce("orders", 0, None, "b");
        let sink = MemorySink::new("mem");
        sink.set_fail_all(true);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(
            IngestionLoop::new(broker.client(GROUP), sink.clone(), fast_config("orders"), rx).run(),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        let stats = handle.await.unwrap().unwrap();

        assert!(stats.persist_failures >= 1);
        assert_eq!(stats.persisted, 0);
        assert!(broker.commit_log().is_empty());
        assert!(sink.table().is_empty());

        // store recovers: the restarted consumer starts at "a" again
        sink.set_fail_all(false);
        let (_tx, rx) = watch::channel(false);
        IngestionLoop::new(
            broker.client(GROUP),
            sink.clone(),
            fast_config("orders").with_max_records(2),
            rx,
        )
        .run()
        .await
        .unwrap();

        let values: Vec<String> = sink
            .table()
            .rows()
            .into_iter()
            .map(|row| row.message_value)
            .collect();
        assert_eq!(values, vec!["a", "b"]);
        assert_eq!(broker.committed(GROUP, "orders", 0), Some(2));
    }

    /// The offset store rejects every commit: each row is still written once
    #[tokio::test]
    async fn test_failing_commits_never_duplicate_rows() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, Some("1"), "a");
        broker.produce("orders", 0, Some("2"), "b");
        broker.fail_next_commits(u32::MAX);
        let sink = MemorySink::new("mem");
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(
            IngestionLoop::new(broker.client(GROUP), sink.clone(), fast_config("orders"), rx).run(),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop ignored shutdown")
            .unwrap()
            .unwrap();

        assert_eq!(stats.persisted, 2);
        assert_eq!(stats.commit_failures, 2);
        assert_eq!(sink.table().len(), 2);
        assert!(broker.commit_log().is_empty());

        // commits work again: the restart redelivers from the last committed offset
        broker.fail_next_commits(0);
        let (_tx, rx) = watch::channel(false);
        IngestionLoop::new(
            broker.client(GROUP),
            sink.clone(),
            fast_config("orders").with_max_records(2),
            rx,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(sink.table().count_matching("orders", Some("1"), "a"), 2);
        assert_eq!(broker.committed(GROUP, "orders", 0), Some(2));
    }

    #[tokio::test]
    async fn test_null_key_stored_as_null() {
        let broker = MemoryBroker::new();
        broker.produce("IngestTopic", 0, None, "no key here");
        let sink = MemorySink::new("mem");
        let (_tx, rx) = watch::channel(false);

        IngestionLoop::new(
            broker.client(GROUP),
            sink.clone(),
            fast_config("IngestTopic").with_max_records(1),
            rx,
        )
        .run()
        .await
        .unwrap();

        let rows = sink.table().rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message_key, None);
        assert_eq!(rows[0].message_value, "no key here");
        assert_eq!(sink.table().count_matching("IngestTopic", Some(""), "no key here"), 0);
    }

    #[tokio::test]
    async fn test_idle_topic_is_a_no_op() {
        let broker = MemoryBroker::new();
        broker.create_topic("orders", 1);
        let sink = MemorySink::new("mem");
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(
            IngestionLoop::new(broker.client(GROUP), sink.clone(), fast_config("orders"), rx).run(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let stats = handle.await.unwrap().unwrap();

        assert!(stats.idle_polls >= 1);
        assert_eq!(stats.records_received, 0);
        assert!(sink.table().is_empty());
        assert!(broker.commit_log().is_empty());
    }

    /// Crash after the write, before the commit: restart writes a duplicate, loses nothing
    #[tokio::test]
    async fn test_crash_between_persist_and_commit() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, Some("42"), r#"{"amt":10}"#);
        let table = MemoryTable::new();
        let committing = Arc::new(Notify::new());
        let (_tx, rx) = watch::channel(false);

        let crashed = tokio::spawn(
            IngestionLoop::new(
                HangingCommitClient {
                    inner: broker.client(GROUP),
                    committing: committing.clone(),
                },
                MemorySink::with_table("mem", table.clone()),
                fast_config("orders"),
                rx.clone(),
            )
            .run(),
        );
        tokio::time::timeout(Duration::from_secs(5), committing.notified())
            .await
            .expect("loop never reached commit");
        crashed.abort();

        assert_eq!(table.len(), 1);
        assert_eq!(broker.committed(GROUP, "orders", 0), None);

        let stats = IngestionLoop::new(
            broker.client(GROUP),
            MemorySink::with_table("mem", table.clone()),
            fast_config("orders").with_max_records(1),
            rx,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.commits, 1);
        assert!(table.count_matching("orders", Some("42"), r#"{"amt":10}"#) >= 1);
        assert_eq!(broker.committed(GROUP, "orders", 0), Some(1));
    }

    /// A shutdown request during a write lets the write and its commit finish
    #[tokio::test]
    async fn test_shutdown_drains_in_flight_record() {
        let broker = MemoryBroker::new();
        broker.produce("orders", 0, None, "a");
        broker.produce("orders", 0, None, "b");
        let mut sink = MemorySink::new("mem");
        let gate = sink.hold_writes();
        let table = sink.table().clone();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(
            IngestionLoop::new(broker.client(GROUP), sink, fast_config("orders"), rx).run(),
        );
        gate.wait_entered().await;
        tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        gate.release(1);
        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop after shutdown")
            .unwrap()
            .unwrap();

        assert_eq!(stats.persisted, 1);
        assert_eq!(stats.commits, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(broker.committed(GROUP, "orders", 0), Some(1));
    }

    #[tokio::test]
    async fn test_multiple_partitions_commit_independently() {
        let broker = MemoryBroker::new();
        broker.create_topic("orders", 2);
        for i in 0..3 {
            broker.produce("orders", 0, None, &format!("p0-{i}"));
            broker.produce("orders", 1, None, &format!("p1-{i}"));
        }
        let sink = MemorySink::new("mem");
        let (_tx, rx) = watch::channel(false);

        let stats = IngestionLoop::new(
            broker.client(GROUP),
            sink.clone(),
            fast_config("orders").with_max_records(6),
            rx,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.persisted, 6);
        assert_eq!(broker.committed(GROUP, "orders", 0), Some(3));
        assert_eq!(broker.committed(GROUP, "orders", 1), Some(3));
        assert_eq!(stats.commit_pointer.get(0), Some(2));
        assert_eq!(stats.commit_pointer.get(1), Some(2));
        for partition in 0..2 {
            let offsets: Vec<i64> = broker
                .commit_log()
                .iter()
                .filter(|c| c.partition == partition)
                .map(|c| c.next_offset)
                .collect();
            assert_eq!(offsets, vec![1, 2, 3]);
        }
    }
}
