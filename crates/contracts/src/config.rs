//! BridgeConfig - process configuration
//!
//! Describes where to read from (Kafka), where to write to (the store) and
//! how the ingestion loop paces itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BridgeConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Log source
    #[serde(default)]
    #[validate(nested)]
    pub kafka: KafkaConfig,

    /// Relational store
    #[serde(default)]
    #[validate(nested)]
    pub store: StoreConfig,

    /// Loop pacing
    #[serde(default)]
    #[validate(nested)]
    pub ingest: IngestConfig,
}

impl BridgeConfig {
    pub fn broker_address(&self) -> &str {
        &self.kafka.broker_address
    }

    pub fn topic(&self) -> &str {
        &self.kafka.topic
    }

    pub fn consumer_group_id(&self) -> &str {
        &self.kafka.consumer_group_id
    }

    pub fn store_connection_string(&self) -> &str {
        &self.store.connection_string
    }
}

/// Kafka consumer settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KafkaConfig {
    /// Bootstrap servers, comma separated (e.g. "kafka:9092")
    #[serde(default = "default_broker_address")]
    #[validate(length(min = 1, message = "broker_address cannot be empty"))]
    pub broker_address: String,

    /// Topic to ingest
    #[serde(default = "default_topic")]
    #[validate(length(min = 1, max = 249, message = "topic must be 1..=249 characters"))]
    pub topic: String,

    /// Consumer group; fixed so restarts resume from the last commit
    #[serde(default = "default_consumer_group_id")]
    #[validate(length(min = 1, message = "consumer_group_id cannot be empty"))]
    pub consumer_group_id: String,

    /// Where to start when the group has no committed offset
    #[serde(default)]
    pub auto_offset_reset: OffsetReset,

    /// Group session timeout
    #[serde(default = "default_session_timeout_ms")]
    #[validate(range(min = 1000, message = "session_timeout_ms must be >= 1000"))]
    pub session_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            broker_address: default_broker_address(),
            topic: default_topic(),
            consumer_group_id: default_consumer_group_id(),
            auto_offset_reset: OffsetReset::default(),
            session_timeout_ms: default_session_timeout_ms(),
        }
    }
}

fn default_broker_address() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    "IngestTopic".to_string()
}

fn default_consumer_group_id() -> String {
    "sql-ingest-group-1".to_string()
}

fn default_session_timeout_ms() -> u64 {
    10_000
}

/// Initial position for a consumer group without commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

/// Relational store settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    /// Connection string (e.g. "postgres://user:pass@db/ingest")
    #[serde(default)]
    #[validate(length(min = 1, message = "connection_string cannot be empty"))]
    pub connection_string: String,

    /// Target table, optionally schema-qualified
    #[serde(default = "default_table")]
    pub table: String,

    /// Upper bound of pooled physical connections
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1, message = "max_connections must be >= 1"))]
    pub max_connections: u32,

    /// Wait for a pooled connection
    #[serde(default = "default_acquire_timeout_ms")]
    #[validate(range(min = 1, message = "acquire_timeout_ms must be > 0"))]
    pub acquire_timeout_ms: u64,

    /// Bound on one insert transaction
    #[serde(default = "default_write_timeout_ms")]
    #[validate(range(min = 1, message = "write_timeout_ms must be > 0"))]
    pub write_timeout_ms: u64,

    /// Create the target table at startup when missing
    #[serde(default)]
    pub create_table: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            table: default_table(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            create_table: false,
        }
    }
}

impl StoreConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Whether `name` can be spliced into SQL as a table reference
///
/// Accepts `table` or `schema.table`, each part matching
/// `[A-Za-z_][A-Za-z0-9_]*`. Table names cannot be bound as statement
/// parameters, so anything else is rejected.
pub fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

fn default_table() -> String {
    "kafka_ingest_data".to_string()
}

fn default_max_connections() -> u32 {
    4
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

/// Ingestion loop pacing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestConfig {
    /// Bounded wait of a single poll
    #[serde(default = "default_poll_timeout_ms")]
    #[validate(range(min = 1, max = 60000, message = "poll_timeout_ms must be in 1..=60000"))]
    pub poll_timeout_ms: u64,

    /// First delay after a failed write (0 disables backoff)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Delay cap after repeated failed writes
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl IngestConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

fn default_poll_timeout_ms() -> u64 {
    1_000
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}
