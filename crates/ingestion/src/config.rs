//! Loop configuration and redelivery backoff

use std::time::Duration;

use contracts::BridgeConfig;
use rand::Rng;

/// Exponential backoff applied after a failed write
///
/// `min(max_delay, base_delay * 2^attempt)`, optionally with ±25% jitter.
/// A zero `base_delay` disables the backoff entirely.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: true,
        }
    }

    /// No delay between a failed write and the next poll
    pub fn disabled() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Exact delays, no randomness
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Backoff delay for the given number of consecutive failures
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let delay = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(20))
            .min(self.max_delay);
        if !self.jitter {
            return delay;
        }

        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let spread = millis / 4;
        Duration::from_millis(
            rand::rng().random_range(millis - spread..=millis.saturating_add(spread)),
        )
    }
}

/// Ingestion loop configuration
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Topic to subscribe to
    pub topic: String,

    /// Bounded wait of one poll; also the pause after a poll error
    pub poll_timeout: Duration,

    /// Backoff between a failed write and the next poll
    pub retry: RetryConfig,

    /// Stop after this many records were processed (None = unlimited)
    pub max_records: Option<u64>,
}

impl LoopConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            poll_timeout: Duration::from_secs(1),
            retry: RetryConfig::default(),
            max_records: None,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = Some(max_records);
        self
    }
}

impl From<&BridgeConfig> for LoopConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            topic: config.kafka.topic.clone(),
            poll_timeout: config.ingest.poll_timeout(),
            retry: RetryConfig::new(
                config.ingest.retry_base_delay(),
                config.ingest.retry_max_delay(),
            ),
            max_records: None,
        }
    }
}
