//! Kafka log client backed by rdkafka's `StreamConsumer`
//!
//! Manual offset management only: auto commit and auto offset store are off,
//! offsets are committed one record at a time after the sink wrote it.

use std::time::Duration;

use contracts::{ContractError, IngestRecord, KafkaConfig, LogClient, RecordHandle};
use futures::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tracing::{debug, info, trace};

use crate::error::{IngestionError, Result};
use crate::pending::PendingRecord;

/// Kafka consumer implementing [`LogClient`]
pub struct KafkaLogClient {
    consumer: StreamConsumer,
    brokers: String,
    group: String,
    /// delivered but not yet released; handed out again by the next poll
    pending: PendingRecord,
}

impl KafkaLogClient {
    /// Create the consumer (does not contact the broker yet)
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.broker_address)
            .set("group.id", &config.consumer_group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", config.auto_offset_reset.as_str())
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .create()
            .map_err(|e| {
                IngestionError::ClientCreation(ContractError::subscribe(
                    &config.topic,
                    format!("consumer for {} failed: {e}", config.broker_address),
                ))
            })?;

        Ok(Self {
            consumer,
            brokers: config.broker_address.clone(),
            group: config.consumer_group_id.clone(),
            pending: PendingRecord::default(),
        })
    }

    fn convert_message(msg: &BorrowedMessage<'_>) -> IngestRecord {
        to_record(
            msg.topic(),
            msg.partition(),
            msg.offset(),
            msg.key(),
            msg.payload(),
        )
    }
}

/// Decode raw key and payload bytes
///
/// Both are decoded as lossy UTF-8. A tombstone (no payload) becomes an
/// empty value; an absent key stays `None`.
fn to_record(
    topic: &str,
    partition: i32,
    offset: i64,
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
) -> IngestRecord {
    IngestRecord::new(
        topic,
        RecordHandle::new(partition, offset),
        key.map(|k| String::from_utf8_lossy(k).into_owned()),
        payload
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default(),
    )
}

impl LogClient for KafkaLogClient {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn subscribe(&mut self, topic: &str) -> std::result::Result<(), ContractError> {
        self.consumer
            .subscribe(&[topic])
            .map_err(|e| ContractError::subscribe(topic, e.to_string()))?;

        info!(
            topic = %topic,
            group = %self.group,
            servers = %self.brokers,
            "Kafka consumer subscribed"
        );
        Ok(())
    }

    async fn poll(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<IngestRecord>, ContractError> {
        if let Some(record) = self.pending.redeliver() {
            trace!(handle = %record.handle, "redelivering unreleased record");
            return Ok(Some(record));
        }

        let polled = {
            let stream = self.consumer.stream();
            tokio::pin!(stream);

            match tokio::time::timeout(timeout, stream.next()).await {
                Ok(Some(Ok(msg))) => Ok(Some(Self::convert_message(&msg))),
                Ok(Some(Err(e))) => Err(ContractError::poll(e.to_string())),
                Ok(None) | Err(_) => Ok(None),
            }
        };

        if let Ok(Some(record)) = &polled {
            self.pending.hold(record);
        }
        polled
    }

    fn release(&mut self, handle: &RecordHandle) {
        self.pending.release(handle);
    }

    async fn commit(&mut self, record: &IngestRecord) -> std::result::Result<(), ContractError> {
        let commit_error = |e: KafkaError| {
            ContractError::commit(&record.topic, record.partition(), record.offset(), e.to_string())
        };

        let mut tpl = TopicPartitionList::new();
        // committed offset is the next offset to read
        tpl.add_partition_offset(
            &record.topic,
            record.partition(),
            Offset::Offset(record.offset() + 1),
        )
        .map_err(commit_error)?;

        // Sync: the broker's answer is known before the next poll.
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(commit_error)?;

        self.pending.release(&record.handle);

        debug!(
            topic = %record.topic,
            partition = record.partition(),
            offset = record.offset(),
            "Offset committed"
        );
        Ok(())
    }

    async fn close(&mut self) -> std::result::Result<(), ContractError> {
        self.pending.clear();
        self.consumer.unsubscribe();
        info!(group = %self.group, "Kafka consumer unsubscribed");
        Ok(())
    }
}
