//! Lazy prefix scans.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::storage::{DataClient, Row, StorageResult, DEFAULT_SCAN_PAGE_SIZE};

/// A prefix scan that can be consumed any number of times.
///
/// Each call to [`RowScan::stream`] starts a fresh pass from the first
/// matching key. Rows are fetched one page at a time, only when the
/// consumer asks for the next row; dropping the stream stops the scan.
#[derive(Clone)]
pub struct RowScan {
    client: Arc<dyn DataClient>,
    table: String,
    prefix: String,
    page_size: usize,
}

struct ScanState {
    client: Arc<dyn DataClient>,
    table: String,
    prefix: String,
    page_size: usize,
    buffered: VecDeque<Row>,
    last_key: Option<String>,
    exhausted: bool,
}

impl RowScan {
    pub fn new(client: Arc<dyn DataClient>, table: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            prefix: prefix.into(),
            page_size: DEFAULT_SCAN_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Start a new pass over the matching rows, in key order.
    ///
    /// The first error ends the stream after it is yielded.
    pub fn stream(&self) -> BoxStream<'static, StorageResult<Row>> {
        let state = ScanState {
            client: self.client.clone(),
            table: self.table.clone(),
            prefix: self.prefix.clone(),
            page_size: self.page_size,
            buffered: VecDeque::new(),
            last_key: None,
            exhausted: false,
        };

        stream::unfold(state, |mut st| async move {
            loop {
                if let Some(row) = st.buffered.pop_front() {
                    st.last_key = Some(row.key.clone());
                    return Some((Ok(row), st));
                }
                if st.exhausted {
                    return None;
                }

                let page = st
                    .client
                    .read_rows_page(&st.table, &st.prefix, st.last_key.as_deref(), st.page_size)
                    .await;
                match page {
                    Ok(rows) => {
                        tracing::trace!(table = %st.table, rows = rows.len(), "Fetched scan page");
                        if rows.len() < st.page_size {
                            st.exhausted = true;
                        }
                        st.buffered.extend(rows);
                    }
                    Err(e) => {
                        st.exhausted = true;
                        return Some((Err(e), st));
                    }
                }
            }
        })
        .boxed()
    }

    /// Drain a full pass into memory.
    pub async fn collect(&self) -> StorageResult<Vec<Row>> {
        self.stream().try_collect().await
    }
}

impl std::fmt::Debug for RowScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowScan")
            .field("table", &self.table)
            .field("prefix", &self.prefix)
            .field("page_size", &self.page_size)
            .finish()
    }
}
