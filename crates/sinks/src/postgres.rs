//! PgSink - one row per record in PostgreSQL
//!
//! Every write runs in its own transaction on a pooled connection. The
//! transaction and the connection are released on every exit path: an
//! uncommitted `sqlx::Transaction` rolls back when dropped, and the
//! connection returns to the pool with it.

use std::time::Duration;

use contracts::{is_valid_table_name, IngestRecord, PersistOutcome, RecordSink, StoreConfig};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, instrument, warn};

use crate::error::SinkError;

/// PostgreSQL sink
pub struct PgSink {
    name: String,
    pool: PgPool,
    table: String,
    insert_sql: String,
    write_timeout: Duration,
}

impl PgSink {
    /// Connect using the store configuration
    ///
    /// Fails when the table name is invalid or the store is unreachable;
    /// both are startup misconfigurations.
    #[instrument(name = "pg_sink_connect", skip(config), fields(table = %config.table))]
    pub async fn connect(config: &StoreConfig) -> Result<Self, SinkError> {
        let name = "postgres";
        if !is_valid_table_name(&config.table) {
            return Err(SinkError::InvalidTable {
                table: config.table.clone(),
            });
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.connection_string)
            .await
            .map_err(|e| SinkError::connection(name, e.to_string()))?;

        info!(
            table = %config.table,
            max_connections = config.max_connections,
            "PgSink connected"
        );

        Self::with_pool(name, pool, &config.table, config.write_timeout())
    }

    /// Build a sink on an existing pool
    pub fn with_pool(
        name: impl Into<String>,
        pool: PgPool,
        table: &str,
        write_timeout: Duration,
    ) -> Result<Self, SinkError> {
        if !is_valid_table_name(table) {
            return Err(SinkError::InvalidTable {
                table: table.to_string(),
            });
        }

        Ok(Self {
            name: name.into(),
            pool,
            table: table.to_string(),
            insert_sql: insert_statement(table),
            write_timeout,
        })
    }

    /// Create the target table when it does not exist
    pub async fn ensure_table(&self) -> Result<(), SinkError> {
        sqlx::query(&create_table_statement(&self.table))
            .execute(&self.pool)
            .await
            .map_err(|e| SinkError::schema(&self.name, e.to_string()))?;
        info!(table = %self.table, "Target table ready");
        Ok(())
    }

    async fn insert(&self, record: &IngestRecord) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&self.insert_sql)
            .bind(&record.topic)
            .bind(record.key.as_deref())
            .bind(&record.value)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }
}

fn insert_statement(table: &str) -> String {
    format!("INSERT INTO {table} (topic, message_key, message_value) VALUES ($1, $2, $3)")
}

fn create_table_statement(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
            id BIGSERIAL PRIMARY KEY, \
            topic TEXT NOT NULL, \
            message_key TEXT NULL, \
            message_value TEXT NOT NULL, \
            ingested_at TIMESTAMPTZ NOT NULL DEFAULT now()\
        )"
    )
}

impl RecordSink for PgSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "pg_sink_persist",
        skip(self, record),
        fields(sink = %self.name, handle = %record.handle)
    )]
    async fn persist(&mut self, record: &IngestRecord) -> PersistOutcome {
        match tokio::time::timeout(self.write_timeout, self.insert(record)).await {
            Ok(Ok(())) => {
                debug!(table = %self.table, "row inserted");
                PersistOutcome::Success
            }
            Ok(Err(e)) => {
                warn!(error = %e, "insert failed");
                PersistOutcome::failure(e.to_string())
            }
            Err(_) => {
                warn!(timeout_ms = self.write_timeout.as_millis() as u64, "insert timed out");
                PersistOutcome::failure(format!(
                    "insert timed out after {}ms",
                    self.write_timeout.as_millis()
                ))
            }
        }
    }

    #[instrument(name = "pg_sink_close", skip(self))]
    async fn close(&mut self) {
        self.pool.close().await;
        info!(sink = %self.name, "PgSink closed");
    }
}
