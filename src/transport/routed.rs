//! Data client that routes every RPC through the channel.
//!
//! # Data Flow
//! ```text
//! DataClient call
//!     → request metadata (request params, resource prefix, request id)
//!     → Channel::pick (key builders → route table → fallback)
//!     → TargetPool backend for the picked target
//!     → size limits, metrics, span with request id
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::Instrument;
use uuid::Uuid;

use crate::observability::metrics;
use crate::rls::{REQUEST_PARAMS_HEADER, RESOURCE_PREFIX_HEADER, STORAGE_SERVICE};
use crate::routing::RequestMetadata;
use crate::storage::{DataClient, Mutation, Row, StorageError, StorageResult};
use crate::transport::{Channel, Pick, TargetPool};

/// Header carrying the per-RPC request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MUTATE_ROW: &str = "MutateRow";
const READ_ROWS: &str = "ReadRows";

/// A [`DataClient`] that resolves a target per request.
#[derive(Debug, Clone)]
pub struct RoutedDataClient {
    channel: Arc<Channel>,
    pool: TargetPool,
    resource_prefix: String,
}

impl RoutedDataClient {
    /// `resource_prefix` is `projects/{project}/instances/{instance}`.
    pub fn new(channel: Arc<Channel>, pool: TargetPool, resource_prefix: impl Into<String>) -> Self {
        Self {
            channel,
            pool,
            resource_prefix: resource_prefix.into(),
        }
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    pub fn pool(&self) -> &TargetPool {
        &self.pool
    }

    /// The metadata a request for `table` carries.
    pub fn request_metadata(&self, table: &str, method: &str, request_id: &Uuid) -> RequestMetadata {
        let table_name = format!("{}/tables/{}", self.resource_prefix, table);
        let params = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("table_name", &table_name)
            .append_pair("app_profile_id", self.channel.options().app_profile.as_deref().unwrap_or(""))
            .finish();

        RequestMetadata::new(self.channel.authority(), STORAGE_SERVICE, method)
            .with_header(REQUEST_PARAMS_HEADER, params)
            .with_header(RESOURCE_PREFIX_HEADER, self.resource_prefix.as_str())
            .with_header(REQUEST_ID_HEADER, request_id.to_string())
    }

    fn route(&self, table: &str, method: &str) -> (Pick, tracing::Span) {
        let request_id = Uuid::new_v4();
        let pick = self.channel.pick(&self.request_metadata(table, method, &request_id));
        let span = tracing::debug_span!(
            "rpc",
            request_id = %request_id,
            method,
            table,
            endpoint = %pick.target,
            outcome = pick.outcome.label()
        );
        (pick, span)
    }

    fn backend(&self, pick: &Pick) -> StorageResult<Arc<dyn DataClient>> {
        self.pool
            .get(&pick.target)
            .ok_or_else(|| StorageError::Unavailable(format!("no backend for target {}", pick.target)))
    }

    fn check_recv(&self, row: &Row) -> StorageResult<()> {
        let limit = self.channel.options().max_recv_message_bytes;
        let len = row.encoded_len();
        if len > limit {
            return Err(StorageError::ResourceExhausted(format!(
                "row {} is {} bytes, receive limit is {}",
                row.key, len, limit
            )));
        }
        Ok(())
    }
}

fn finish<T>(op: &'static str, start: Instant, result: StorageResult<T>) -> StorageResult<T> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    metrics::record_storage_request(op, outcome, start);
    if let Err(e) = &result {
        tracing::debug!(op, error = %e, "Storage request failed");
    }
    result
}

#[async_trait]
impl DataClient for RoutedDataClient {
    async fn apply_mutation(&self, table: &str, row_key: &str, mutation: Mutation) -> StorageResult<()> {
        let start = Instant::now();
        let (pick, span) = self.route(table, MUTATE_ROW);

        let result = async {
            let limit = self.channel.options().max_send_message_bytes;
            let len = row_key.len() + mutation.encoded_len();
            if len > limit {
                return Err(StorageError::ResourceExhausted(format!(
                    "mutation for row {} is {} bytes, send limit is {}",
                    row_key, len, limit
                )));
            }
            self.backend(&pick)?.apply_mutation(table, row_key, mutation).await
        }
        .instrument(span)
        .await;

        finish("apply_mutation", start, result)
    }

    async fn read_row(&self, table: &str, row_key: &str) -> StorageResult<Row> {
        let start = Instant::now();
        let (pick, span) = self.route(table, READ_ROWS);

        let result = async {
            let row = self.backend(&pick)?.read_row(table, row_key).await?;
            self.check_recv(&row)?;
            Ok(row)
        }
        .instrument(span)
        .await;

        finish("read_row", start, result)
    }

    async fn read_rows_page(
        &self,
        table: &str,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<Row>> {
        let start = Instant::now();
        let (pick, span) = self.route(table, READ_ROWS);

        let result = async {
            let rows = self
                .backend(&pick)?
                .read_rows_page(table, prefix, start_after, limit)
                .await?;
            for row in &rows {
                self.check_recv(row)?;
            }
            Ok(rows)
        }
        .instrument(span)
        .await;

        finish("read_rows", start, result)
    }
}
