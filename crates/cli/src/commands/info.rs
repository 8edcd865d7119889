//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::BridgeConfig;
use serde::Serialize;

use super::{load_config, mask_connection_string};
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    kafka: KafkaInfo,
    store: StoreInfo,
    ingest: IngestInfo,
}

#[derive(Serialize)]
struct KafkaInfo {
    brokers: String,
    topic: String,
    consumer_group: String,
    auto_offset_reset: String,
    session_timeout_ms: u64,
}

#[derive(Serialize)]
struct StoreInfo {
    connection: String,
    table: String,
    create_table: bool,
    max_connections: u32,
    write_timeout_ms: u64,
}

#[derive(Serialize)]
struct IngestInfo {
    poll_timeout_ms: u64,
    retry_base_delay_ms: u64,
    retry_max_delay_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.overrides)
        .context("Failed to load configuration")?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &BridgeConfig) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", config.version),
        kafka: KafkaInfo {
            brokers: config.broker_address().to_string(),
            topic: config.topic().to_string(),
            consumer_group: config.consumer_group_id().to_string(),
            auto_offset_reset: config.kafka.auto_offset_reset.as_str().to_string(),
            session_timeout_ms: config.kafka.session_timeout_ms,
        },
        store: StoreInfo {
            connection: mask_connection_string(config.store_connection_string()),
            table: config.store.table.clone(),
            create_table: config.store.create_table,
            max_connections: config.store.max_connections,
            write_timeout_ms: config.store.write_timeout_ms,
        },
        ingest: IngestInfo {
            poll_timeout_ms: config.ingest.poll_timeout_ms,
            retry_base_delay_ms: config.ingest.retry_base_delay_ms,
            retry_max_delay_ms: config.ingest.retry_max_delay_ms,
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("Configuration (version {})", info.version);

    println!("\nKafka");
    println!("  brokers:            {}", info.kafka.brokers);
    println!("  topic:              {}", info.kafka.topic);
    println!("  consumer group:     {}", info.kafka.consumer_group);
    println!("  auto offset reset:  {}", info.kafka.auto_offset_reset);
    println!("  session timeout:    {}ms", info.kafka.session_timeout_ms);

    println!("\nStore");
    println!("  connection:         {}", info.store.connection);
    println!("  table:              {}", info.store.table);
    println!("  create table:       {}", info.store.create_table);
    println!("  max connections:    {}", info.store.max_connections);
    println!("  write timeout:      {}ms", info.store.write_timeout_ms);

    println!("\nIngest");
    println!("  poll timeout:       {}ms", info.ingest.poll_timeout_ms);
    println!(
        "  retry backoff:      {}ms .. {}ms",
        info.ingest.retry_base_delay_ms, info.ingest.retry_max_delay_ms
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_masks_password() {
        let mut config = BridgeConfig::default();
        config.store.connection_string = "postgres://ingest:hunter2@db/ingest".into();

        let info = build_config_info(&config);
        assert_eq!(info.store.connection, "postgres://ingest:***@db/ingest");
        assert_eq!(info.kafka.consumer_group, "sql-ingest-group-1");

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
