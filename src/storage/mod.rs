//! Storage service collaborators.
//!
//! # Data Flow
//! ```text
//! Harness stage
//!     → AdminClient (table lifecycle: info / create / family / delete)
//!     → DataClient  (apply mutation / read row / paged prefix scan)
//!     → rows.rs     (RowScan: lazy, restartable sequence over pages)
//!
//! Backends:
//!     memory.rs → in-process emulator used by the binary and the tests
//!     transport::RoutedDataClient → DataClient that routes every RPC
//! ```
//!
//! # Design Decisions
//! - Traits are object-safe so sessions can hold `Arc<dyn ...>`
//! - Errors carry a status-like classification; callers branch on it
//! - Absent rows read back as an empty `Row`, not an error

pub mod error;
pub mod memory;
pub mod rows;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use rows::RowScan;
pub use types::{Cell, Mutation, Row, Timestamp};

/// Number of rows fetched per scan page when the caller does not choose.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 100;

/// Administrative operations on tables.
#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Look up a table. Fails with [`StorageError::NotFound`] when it does not exist.
    async fn table_info(&self, table: &str) -> StorageResult<TableInfo>;

    /// Create an empty table.
    async fn create_table(&self, table: &str) -> StorageResult<()>;

    /// Add a column family to an existing table.
    async fn create_column_family(&self, table: &str, family: &str) -> StorageResult<()>;

    /// Delete a table and all of its rows.
    async fn delete_table(&self, table: &str) -> StorageResult<()>;

    /// Returns true if the table exists. Only `NotFound` maps to `false`.
    async fn table_exists(&self, table: &str) -> StorageResult<bool> {
        match self.table_info(table).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Row-level data plane operations.
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Apply all cell mutations to a single row atomically.
    async fn apply_mutation(&self, table: &str, row_key: &str, mutation: Mutation) -> StorageResult<()>;

    /// Read one row by exact key. A missing row reads back empty.
    async fn read_row(&self, table: &str, row_key: &str) -> StorageResult<Row>;

    /// Read up to `limit` rows whose key starts with `prefix` and sorts after `start_after`.
    async fn read_rows_page(
        &self,
        table: &str,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<Row>>;
}

/// Scan every row of `table` whose key starts with `prefix`.
pub fn scan_rows(client: &Arc<dyn DataClient>, table: &str, prefix: &str) -> RowScan {
    RowScan::new(client.clone(), table, prefix)
}

/// Metadata returned by [`AdminClient::table_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    /// Column family names in lexical order.
    pub families: Vec<String>,
}
