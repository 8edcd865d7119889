//! Pipeline orchestrator - wires the Kafka client and the store into one loop.

use contracts::BridgeConfig;
use ingestion::{IngestionLoop, KafkaLogClient, LoopConfig, LoopStats};
use sinks::PgSink;
use tokio::sync::watch;
use tracing::info;

use crate::error::{CliError, Result};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated bridge configuration
    pub bridge: BridgeConfig,

    /// Maximum number of records to process (None = unlimited)
    pub max_records: Option<u64>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Connect the store and the broker, then run the loop until shutdown
    ///
    /// The store is connected first: an unreachable store is a startup
    /// failure and no record is consumed.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<LoopStats> {
        let bridge = &self.config.bridge;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port).map_err(CliError::Metrics)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let sink = PgSink::connect(&bridge.store).await?;
        if bridge.store.create_table {
            sink.ensure_table().await?;
        }

        let client = KafkaLogClient::new(&bridge.kafka)?;

        let mut loop_config = LoopConfig::from(bridge);
        if let Some(max) = self.config.max_records {
            loop_config = loop_config.with_max_records(max);
        }

        info!(
            topic = %bridge.topic(),
            group = %bridge.consumer_group_id(),
            table = %bridge.store.table,
            "Starting ingestion loop"
        );

        let stats = IngestionLoop::new(client, sink, loop_config, shutdown)
            .run()
            .await?;
        Ok(stats)
    }
}
