//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rls_harness::config::{HarnessConfig, RuleConfig};
use rls_harness::storage::{
    AdminClient, DataClient, MemoryStore, Mutation, Row, StorageError, StorageResult, TableInfo,
};

/// Defaults with the settle delay removed.
#[allow(dead_code)]
pub fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.run.table_creation_wait_secs = 0;
    config
}

#[allow(dead_code)]
pub fn rule(pattern: &str, target: &str) -> RuleConfig {
    RuleConfig {
        pattern: pattern.into(),
        target: target.into(),
    }
}

/// Emulator with the configured table and family already present.
#[allow(dead_code)]
pub async fn store_with_table(config: &HarnessConfig) -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table(&config.storage.table_id).await.unwrap();
    store
        .create_column_family(&config.storage.table_id, &config.storage.column_family)
        .await
        .unwrap();
    store
}

/// Admin client that delegates to a store but injects programmed failures.
#[allow(dead_code)]
#[derive(Default)]
pub struct FaultyAdmin {
    pub store: MemoryStore,
    pub table_info_error: Mutex<Option<StorageError>>,
    pub create_table_error: Mutex<Option<StorageError>>,
    pub delete_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FaultyAdmin {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn fail_table_info(self, error: StorageError) -> Self {
        *self.table_info_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_create_table(self, error: StorageError) -> Self {
        *self.create_table_error.lock().unwrap() = Some(error);
        self
    }
}

#[async_trait]
impl AdminClient for FaultyAdmin {
    async fn table_info(&self, table: &str) -> StorageResult<TableInfo> {
        if let Some(e) = self.table_info_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.store.table_info(table).await
    }

    async fn create_table(&self, table: &str) -> StorageResult<()> {
        if let Some(e) = self.create_table_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.store.create_table(table).await
    }

    async fn create_column_family(&self, table: &str, family: &str) -> StorageResult<()> {
        self.store.create_column_family(table, family).await
    }

    async fn delete_table(&self, table: &str) -> StorageResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.store.delete_table(table).await
    }
}

/// Data client that counts calls before delegating.
#[allow(dead_code)]
pub struct CountingData {
    pub inner: Arc<dyn DataClient>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingData {
    pub fn new(inner: Arc<dyn DataClient>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataClient for CountingData {
    async fn apply_mutation(&self, table: &str, row_key: &str, mutation: Mutation) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_mutation(table, row_key, mutation).await
    }

    async fn read_row(&self, table: &str, row_key: &str) -> StorageResult<Row> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read_row(table, row_key).await
    }

    async fn read_rows_page(
        &self,
        table: &str,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<Row>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read_rows_page(table, prefix, start_after, limit).await
    }
}
