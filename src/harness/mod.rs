//! The integration run.
//!
//! # Data Flow
//! ```text
//! Sessions (admin + data)
//!     → ensure_table      (exists? else create table + column family)
//!     → settle delay      (table creation propagation)
//!     → write_greetings   ({prefix}0..2, one cell each)
//!     → read_single_row   ({prefix}0)
//!     → read_entire_table (prefix scan, streamed)
//!     → teardown          (delete table unless skipped)
//! ```
//!
//! # Design Decisions
//! - Stages run strictly in sequence; the first failure ends the run
//! - No retries or timeouts are added around storage calls
//! - Each error names the stage and the table or row it was working on

pub mod session;

use std::time::Duration;

use futures_util::TryStreamExt;
use thiserror::Error;

use crate::config::{ConfigError, HarnessConfig};
use crate::routing::RuleError;
use crate::storage::{scan_rows, Mutation, Row, StorageError, Timestamp};
use crate::transport::ChannelError;

pub use session::Sessions;

/// Values written to `{prefix}0`, `{prefix}1` and `{prefix}2`.
pub const GREETINGS: [&str; 3] = ["Hello World!", "Hello Storage!", "Hello Routing!"];

/// A failed run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid routing rules: {0}")]
    Routing(#[from] RuleError),

    #[error("rejected configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("could not open data channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("could not ensure table {table}: {source}")]
    EnsureTable { table: String, source: StorageError },

    #[error("could not write row {row_key} to {table}: {source}")]
    Write {
        table: String,
        row_key: String,
        source: StorageError,
    },

    #[error("could not read row {row_key} from {table}: {source}")]
    ReadRow {
        table: String,
        row_key: String,
        source: StorageError,
    },

    #[error("could not scan {table} for prefix {prefix}: {source}")]
    Scan {
        table: String,
        prefix: String,
        source: StorageError,
    },

    #[error("could not delete table {table}: {source}")]
    DeleteTable { table: String, source: StorageError },
}

/// What a completed run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub table: String,
    /// True if the run created the table rather than finding it.
    pub created_table: bool,
    pub rows_written: Vec<String>,
    pub single_row: Row,
    pub scanned_rows: Vec<Row>,
    pub table_deleted: bool,
}

/// Drives one run against a pair of sessions.
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    sessions: Sessions,
}

impl Harness {
    pub fn new(config: HarnessConfig, sessions: Sessions) -> Self {
        Self { config, sessions }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    fn table(&self) -> &str {
        &self.config.storage.table_id
    }

    fn row_key(&self, index: usize) -> String {
        format!("{}{}", self.config.storage.row_key_prefix, index)
    }

    /// Run every stage in order.
    pub async fn run(&self) -> Result<RunReport, HarnessError> {
        tracing::info!(
            table = %self.config.table_name(),
            app_profile = self.config.app_profile().unwrap_or(""),
            routed = self.sessions.router().is_some(),
            "Starting run"
        );

        let created_table = self.ensure_table().await?;

        let wait = Duration::from_secs(self.config.run.table_creation_wait_secs);
        if !wait.is_zero() {
            tracing::info!(wait_secs = wait.as_secs(), "Waiting for table creation to propagate");
            tokio::time::sleep(wait).await;
        }

        let rows_written = self.write_greetings().await?;
        let single_row = self.read_single_row().await?;
        let scanned_rows = self.read_entire_table().await?;
        let table_deleted = self.teardown().await?;

        tracing::info!(rows = scanned_rows.len(), table_deleted, "Run complete");
        Ok(RunReport {
            table: self.table().to_string(),
            created_table,
            rows_written,
            single_row,
            scanned_rows,
            table_deleted,
        })
    }

    /// Make sure the table and its column family exist.
    ///
    /// Returns `true` if this call created the table.
    pub async fn ensure_table(&self) -> Result<bool, HarnessError> {
        let table = self.table();
        let family = &self.config.storage.column_family;
        let err = |source: StorageError| HarnessError::EnsureTable {
            table: table.to_string(),
            source,
        };

        if self.sessions.admin.table_exists(table).await.map_err(err)? {
            tracing::info!(table, "Table already exists");
            return Ok(false);
        }

        tracing::info!(table, "Creating table");
        let created = match self.sessions.admin.create_table(table).await {
            Ok(()) => true,
            Err(e) if e.is_already_exists() => {
                tracing::info!(table, "Table was created concurrently");
                false
            }
            Err(e) => return Err(err(e)),
        };

        tracing::info!(table, family = %family, "Creating column family");
        match self.sessions.admin.create_column_family(table, family).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => tracing::debug!(table, family = %family, "Column family exists"),
            Err(e) => return Err(err(e)),
        }
        Ok(created)
    }

    /// Write one greeting per row. Returns the row keys written.
    pub async fn write_greetings(&self) -> Result<Vec<String>, HarnessError> {
        let storage = &self.config.storage;
        let mut written = Vec::with_capacity(GREETINGS.len());

        tracing::info!(rows = GREETINGS.len(), "Writing greeting rows");
        for (index, greeting) in GREETINGS.iter().enumerate() {
            let row_key = self.row_key(index);
            let mutation = Mutation::new().set(
                storage.column_family.as_str(),
                storage.column_qualifier.as_str(),
                Timestamp::now(),
                *greeting,
            );
            self.sessions
                .data
                .apply_mutation(self.table(), &row_key, mutation)
                .await
                .map_err(|source| HarnessError::Write {
                    table: self.table().to_string(),
                    row_key: row_key.clone(),
                    source,
                })?;
            tracing::debug!(row_key = %row_key, greeting, "Row written");
            written.push(row_key);
        }
        Ok(written)
    }

    /// Read `{prefix}0` back.
    pub async fn read_single_row(&self) -> Result<Row, HarnessError> {
        let row_key = self.row_key(0);
        tracing::info!(row_key = %row_key, "Reading a single row");

        let row = self
            .sessions
            .data
            .read_row(self.table(), &row_key)
            .await
            .map_err(|source| HarnessError::ReadRow {
                table: self.table().to_string(),
                row_key: row_key.clone(),
                source,
            })?;
        if row.is_empty() {
            tracing::warn!(row_key = %row_key, "Row not found");
        }
        log_row(&row);
        Ok(row)
    }

    /// Scan every row with the configured prefix, logging each cell as it arrives.
    pub async fn read_entire_table(&self) -> Result<Vec<Row>, HarnessError> {
        let prefix = &self.config.storage.row_key_prefix;
        tracing::info!(prefix = %prefix, "Reading all greeting rows");

        let err = |source: StorageError| HarnessError::Scan {
            table: self.table().to_string(),
            prefix: prefix.clone(),
            source,
        };
        let mut rows = Vec::new();
        let mut stream = scan_rows(&self.sessions.data, self.table(), prefix).stream();
        while let Some(row) = stream.try_next().await.map_err(err)? {
            log_row(&row);
            rows.push(row);
        }
        Ok(rows)
    }

    /// Delete the table unless teardown is skipped. Returns whether it was deleted.
    pub async fn teardown(&self) -> Result<bool, HarnessError> {
        let table = self.table();
        if self.config.run.skip_table_deletion {
            tracing::info!(table, "Skipping table deletion");
            return Ok(false);
        }

        tracing::info!(table, "Deleting table");
        self.sessions
            .admin
            .delete_table(table)
            .await
            .map_err(|source| HarnessError::DeleteTable {
                table: table.to_string(),
                source,
            })?;
        Ok(true)
    }
}

fn log_row(row: &Row) {
    for (family, cell) in row.cells() {
        tracing::info!(
            row_key = %row.key,
            family,
            column = %cell.column,
            timestamp = %cell.timestamp,
            value = %cell.value_lossy(),
            "Cell"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{AdminClient, MemoryStore};

    fn config() -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.run.table_creation_wait_secs = 0;
        config
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let store = MemoryStore::new();
        let sessions = Sessions::connect_emulated(&config(), store.clone()).unwrap();
        let harness = Harness::new(config(), sessions);

        assert!(harness.ensure_table().await.unwrap());
        assert!(!harness.ensure_table().await.unwrap());

        let info = store.table_info("rls-test-table").await.unwrap();
        assert_eq!(info.families, vec!["cf1".to_string()]);
    }

    #[tokio::test]
    async fn test_read_missing_row_is_empty() {
        let store = MemoryStore::new();
        let harness = Harness::new(config(), Sessions::connect_emulated(&config(), store).unwrap());
        harness.ensure_table().await.unwrap();

        assert!(harness.read_single_row().await.unwrap().is_empty());
        assert!(harness.read_entire_table().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_to_missing_table_names_row() {
        let harness = Harness::new(config(), Sessions::connect_emulated(&config(), MemoryStore::new()).unwrap());

        let err = harness.write_greetings().await.unwrap_err();
        match err {
            HarnessError::Write { row_key, source, .. } => {
                assert_eq!(row_key, "row_key_0");
                assert!(source.is_not_found());
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
