//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::BridgeConfig;
use tokio::sync::watch;
use tracing::{info, warn};

use super::{load_config, mask_connection_string};
use crate::cli::RunArgs;
use crate::pipeline::{print_summary, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.overrides)
        .context("Failed to load configuration")?;

    info!(
        brokers = %config.broker_address(),
        topic = %config.topic(),
        group = %config.consumer_group_id(),
        table = %config.store.table,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        bridge: config,
        max_records: (args.max_records > 0).then_some(args.max_records),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    // The loop observes the flag between records, so an in-flight write
    // and its commit finish before it exits.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, draining in-flight record...");
        let _ = shutdown_tx.send(true);
    });

    info!("Starting pipeline...");
    let result = pipeline.run(shutdown_rx).await;
    signal_task.abort();

    let stats = result.context("Pipeline execution failed")?;
    info!(
        persisted = stats.persisted,
        persist_failures = stats.persist_failures,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Pipeline completed"
    );
    print_summary(&stats);

    info!("Ingest bridge finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &BridgeConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Kafka:");
    println!("  Brokers: {}", config.broker_address());
    println!("  Topic: {}", config.topic());
    println!("  Consumer group: {}", config.consumer_group_id());
    println!("  Offset reset: {}", config.kafka.auto_offset_reset.as_str());
    println!("\nStore:");
    println!(
        "  Connection: {}",
        mask_connection_string(config.store_connection_string())
    );
    println!("  Table: {}", config.store.table);
    println!("  Create table: {}", config.store.create_table);
    println!("\nLoop:");
    println!("  Poll timeout: {}ms", config.ingest.poll_timeout_ms);
    println!(
        "  Retry backoff: {}ms .. {}ms",
        config.ingest.retry_base_delay_ms, config.ingest.retry_max_delay_ms
    );
    println!();
}
