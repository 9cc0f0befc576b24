//! In-process storage emulator.
//!
//! # Responsibilities
//! - Serve the admin and data traits without a remote service
//! - Keep rows in key order so prefix scans page deterministically
//! - Reproduce the service's error classification
//!
//! # Design Decisions
//! - One `DashMap` shard entry per table; no lock is held across an await
//! - Cells keep every version, newest first per column

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::storage::{
    AdminClient, Cell, DataClient, Mutation, Row, StorageError, StorageResult, TableInfo, Timestamp,
};

type Versions = Vec<(Timestamp, Vec<u8>)>;

#[derive(Debug, Default)]
struct TableData {
    families: BTreeSet<String>,
    /// row key → family → qualifier → versions (newest first)
    rows: BTreeMap<String, BTreeMap<String, BTreeMap<String, Versions>>>,
}

impl TableData {
    fn render_row(&self, key: &str) -> Row {
        let mut row = Row::new(key);
        if let Some(families) = self.rows.get(key) {
            for (family, columns) in families {
                let cells = columns
                    .iter()
                    .flat_map(|(qualifier, versions)| {
                        versions.iter().map(move |(ts, value)| Cell {
                            column: format!("{}:{}", family, qualifier),
                            timestamp: *ts,
                            value: value.clone(),
                        })
                    })
                    .collect::<Vec<_>>();
                if !cells.is_empty() {
                    row.families.insert(family.clone(), cells);
                }
            }
        }
        row
    }
}

/// Thread-safe in-memory implementation of [`AdminClient`] and [`DataClient`].
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<DashMap<String, TableData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tables currently present.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Number of rows in `table`, if it exists.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }
}

fn table_not_found(table: &str) -> StorageError {
    StorageError::NotFound(format!("table {:?}", table))
}

#[async_trait]
impl AdminClient for MemoryStore {
    async fn table_info(&self, table: &str) -> StorageResult<TableInfo> {
        let data = self.tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(TableInfo {
            name: table.to_string(),
            families: data.families.iter().cloned().collect(),
        })
    }

    async fn create_table(&self, table: &str) -> StorageResult<()> {
        if table.is_empty() {
            return Err(StorageError::InvalidArgument("table name must not be empty".into()));
        }
        match self.tables.entry(table.to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(format!("table {:?}", table))),
            Entry::Vacant(slot) => {
                slot.insert(TableData::default());
                tracing::debug!(table = %table, "Emulator created table");
                Ok(())
            }
        }
    }

    async fn create_column_family(&self, table: &str, family: &str) -> StorageResult<()> {
        if family.is_empty() {
            return Err(StorageError::InvalidArgument("column family name must not be empty".into()));
        }
        let mut data = self.tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        if !data.families.insert(family.to_string()) {
            return Err(StorageError::AlreadyExists(format!(
                "column family {:?} in table {:?}",
                family, table
            )));
        }
        tracing::debug!(table = %table, family = %family, "Emulator created column family");
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> StorageResult<()> {
        self.tables
            .remove(table)
            .map(|_| tracing::debug!(table = %table, "Emulator deleted table"))
            .ok_or_else(|| table_not_found(table))
    }
}

#[async_trait]
impl DataClient for MemoryStore {
    async fn apply_mutation(&self, table: &str, row_key: &str, mutation: Mutation) -> StorageResult<()> {
        if row_key.is_empty() {
            return Err(StorageError::InvalidArgument("row key must not be empty".into()));
        }
        let mut data = self.tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        // Validate before touching the row so the mutation stays atomic.
        if let Some(op) = mutation.ops().iter().find(|op| !data.families.contains(&op.family)) {
            return Err(StorageError::InvalidArgument(format!(
                "unknown column family {:?} in table {:?}",
                op.family, table
            )));
        }

        let row = data.rows.entry(row_key.to_string()).or_default();
        for op in mutation.ops() {
            let versions = row
                .entry(op.family.clone())
                .or_default()
                .entry(op.qualifier.clone())
                .or_default();
            versions.retain(|(ts, _)| *ts != op.timestamp);
            let at = versions.partition_point(|(ts, _)| *ts > op.timestamp);
            versions.insert(at, (op.timestamp, op.value.clone()));
        }
        Ok(())
    }

    async fn read_row(&self, table: &str, row_key: &str) -> StorageResult<Row> {
        let data = self.tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(data.render_row(row_key))
    }

    async fn read_rows_page(
        &self,
        table: &str,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<Row>> {
        let data = self.tables.get(table).ok_or_else(|| table_not_found(table))?;

        let lower = match start_after {
            Some(key) if key >= prefix => Bound::Excluded(key),
            _ => Bound::Included(prefix),
        };

        let rows = data
            .rows
            .range::<str, _>((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| data.render_row(key))
            .filter(|row| !row.is_empty())
            .take(limit)
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::scan_rows;

    async fn store_with_table() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("t").await.unwrap();
        store.create_column_family("t", "cf").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_admin_lifecycle() {
        let store = MemoryStore::new();
        assert!(!store.table_exists("t").await.unwrap());

        store.create_table("t").await.unwrap();
        assert!(store.table_exists("t").await.unwrap());
        assert!(store.create_table("t").await.unwrap_err().is_already_exists());

        store.create_column_family("t", "cf").await.unwrap();
        assert!(store.create_column_family("t", "cf").await.unwrap_err().is_already_exists());
        assert_eq!(store.table_info("t").await.unwrap().families, vec!["cf".to_string()]);

        store.delete_table("t").await.unwrap();
        assert!(store.delete_table("t").await.unwrap_err().is_not_found());
        assert!(store.table_info("t").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_write_and_read_row() {
        let store = store_with_table().await;
        let m = Mutation::new().set("cf", "greeting", Timestamp::from_micros(1000), "hello");
        store.apply_mutation("t", "row_0", m).await.unwrap();

        let row = store.read_row("t", "row_0").await.unwrap();
        assert_eq!(row.key, "row_0");
        assert_eq!(row.cell_count(), 1);
        let (family, cell) = row.cells().next().unwrap();
        assert_eq!(family, "cf");
        assert_eq!(cell.column, "cf:greeting");
        assert_eq!(cell.value, b"hello".to_vec());

        assert!(store.read_row("t", "missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_versions_newest_first() {
        let store = store_with_table().await;
        for (ts, v) in [(1000, "old"), (3000, "new"), (2000, "mid")] {
            let m = Mutation::new().set("cf", "q", Timestamp::from_micros(ts), v);
            store.apply_mutation("t", "r", m).await.unwrap();
        }
        let row = store.read_row("t", "r").await.unwrap();
        let values: Vec<_> = row.cells().map(|(_, c)| c.value_lossy()).collect();
        assert_eq!(values, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_unknown_family_is_rejected_atomically() {
        let store = store_with_table().await;
        let m = Mutation::new()
            .set("cf", "q", Timestamp::from_micros(1000), "ok")
            .set("nope", "q", Timestamp::from_micros(1000), "bad");
        let err = store.apply_mutation("t", "r", m).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
        assert!(store.read_row("t", "r").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_table() {
        let store = MemoryStore::new();
        let m = Mutation::new().set("cf", "q", Timestamp::from_micros(1000), "v");
        assert!(store.apply_mutation("t", "r", m).await.unwrap_err().is_not_found());
        assert!(store.read_row("t", "r").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_prefix_scan_pages_in_key_order() {
        let store = store_with_table().await;
        for key in ["a_0", "p_2", "p_0", "p_1", "q_0"] {
            let m = Mutation::new().set("cf", "q", Timestamp::from_micros(1000), key);
            store.apply_mutation("t", key, m).await.unwrap();
        }

        let client: Arc<dyn DataClient> = Arc::new(store.clone());
        let scan = scan_rows(&client, "t", "p_").with_page_size(2);
        let keys: Vec<_> = scan.collect().await.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["p_0", "p_1", "p_2"]);

        // Restartable: a second pass yields the same rows.
        assert_eq!(scan.collect().await.unwrap().len(), 3);

        let page = store.read_rows_page("t", "p_", Some("p_0"), 10).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].key, "p_1");
    }
}
