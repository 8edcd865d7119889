//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ingest Bridge - copy Kafka records into a SQL table, at least once
#[derive(Parser, Debug)]
#[command(
    name = "ingest-bridge",
    author,
    version,
    about = "Kafka to SQL ingestion bridge",
    long_about = "Consumes one Kafka topic and writes every record as a row into a SQL table.\n\n\
                  Offsets are committed only after the row was written, so a crash or a \n\
                  failed write leads to redelivery, never to a lost record."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "INGEST_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "INGEST_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default filter level; `RUST_LOG` takes precedence
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingestion loop until interrupted
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Settings that override the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Kafka bootstrap servers
    #[arg(long, env = "INGEST_BROKER_ADDRESS")]
    pub brokers: Option<String>,

    /// Topic to consume
    #[arg(long, env = "INGEST_TOPIC")]
    pub topic: Option<String>,

    /// Consumer group id
    #[arg(long, env = "INGEST_CONSUMER_GROUP")]
    pub group: Option<String>,

    /// Store connection string (postgres://...)
    #[arg(long, env = "INGEST_STORE_URL")]
    pub store_url: Option<String>,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when absent
    #[arg(short, long, env = "INGEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Stop after this many records (0 = unlimited)
    #[arg(long, default_value = "0", env = "INGEST_MAX_RECORDS")]
    pub max_records: u64,

    /// Validate configuration and exit without consuming
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "INGEST_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when absent
    #[arg(short, long, env = "INGEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
