//! The `TableService` collaborator (§6) and its default HTTP-based
//! implementation.
//!
//! The wire protocol for `DescribeTable`/`DescribePath`/`BulkUpsert` is out
//! of scope for this crate (§1 Non-goals); `HttpTableService` is a thin,
//! swappable default so the crate is usable standalone, built the way the
//! teacher's own `Client`/`ClientBuilder` wraps `reqwest`.

use crate::error::Status;
use crate::schema::{TableDescription, TypedRowList};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// The three remote RPCs the Orchestrator depends on (§6).
///
/// Implementors may be a generated gRPC stub, a mock for tests, or the
/// supplied [`HttpTableService`]. All methods are expected to return a
/// single [`Status`] per spec §7 ("run/file/batch status"); retries around
/// `bulk_upsert_rows`/`bulk_upsert_arrow` are the caller's job
/// ([`crate::gateway::UpsertGateway`]), not the implementation's.
#[async_trait]
pub trait TableService: Send + Sync {
    /// Resolve a table's schema (§4.7 step 2).
    async fn describe_table(&self, path: &str) -> Result<TableDescription, Status>;

    /// Fallback used when `describe_table` returns `SCHEME_ERROR` — resolve
    /// whatever path component exists, to build a message naming the
    /// directory instead of the missing table (§4.7 step 3, item C.1).
    async fn describe_path(&self, path: &str) -> Result<TableDescription, Status>;

    /// Upsert one batch of already-typed rows. Must be idempotent: callers
    /// may invoke this more than once for the same batch after a transient
    /// failure (§4.2, §6).
    async fn bulk_upsert_rows(&self, path: &str, rows: &TypedRowList) -> Status;

    /// Upsert one Arrow-serialized batch (§4.6). Same idempotency
    /// requirement as `bulk_upsert_rows`.
    async fn bulk_upsert_arrow(&self, path: &str, ipc_bytes: &[u8]) -> Status;
}

/// Default `TableService` speaking to a remote table service over HTTP.
#[derive(Clone)]
pub struct HttpTableService {
    inner: reqwest::Client,
    base_url: String,
    default_headers: HeaderMap,
}

impl std::fmt::Debug for HttpTableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTableService")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpTableService {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTableServiceBuilder::new(base_url)
            .build()
            .expect("failed to build default HTTP table service")
    }

    pub fn builder(base_url: impl Into<String>) -> HttpTableServiceBuilder {
        HttpTableServiceBuilder::new(base_url)
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), suffix)
    }
}

#[async_trait]
impl TableService for HttpTableService {
    async fn describe_table(&self, path: &str) -> Result<TableDescription, Status> {
        let resp = self
            .inner
            .post(self.url("/describe_table"))
            .headers(self.default_headers.clone())
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await
            .map_err(|e| Status::transport("TRANSPORT_ERROR", e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Status::scheme_error(format!(
                "describe_table({path}) failed with HTTP {}",
                resp.status()
            )));
        }

        resp.json::<TableDescription>()
            .await
            .map_err(|e| Status::internal_error(e.to_string()))
    }

    async fn describe_path(&self, path: &str) -> Result<TableDescription, Status> {
        let resp = self
            .inner
            .post(self.url("/describe_path"))
            .headers(self.default_headers.clone())
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await
            .map_err(|e| Status::transport("TRANSPORT_ERROR", e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Status::scheme_error(format!(
                "describe_path({path}) failed with HTTP {}",
                resp.status()
            )));
        }

        resp.json::<TableDescription>()
            .await
            .map_err(|e| Status::internal_error(e.to_string()))
    }

    async fn bulk_upsert_rows(&self, path: &str, rows: &TypedRowList) -> Status {
        let body = serde_json::json!({ "path": path, "row_count": rows.len() });
        self.post_batch("/bulk_upsert", &body).await
    }

    async fn bulk_upsert_arrow(&self, path: &str, ipc_bytes: &[u8]) -> Status {
        let resp = self
            .inner
            .post(self.url("/bulk_upsert_arrow"))
            .headers(self.default_headers.clone())
            .header("x-table-path", path)
            .body(ipc_bytes.to_vec())
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => Status::success(),
            Ok(r) => Status::transport(r.status().to_string(), "bulk_upsert_arrow rejected"),
            Err(e) => Status::transport("TRANSPORT_ERROR", e.to_string()),
        }
    }
}

impl HttpTableService {
    async fn post_batch(&self, suffix: &str, body: &serde_json::Value) -> Status {
        let resp = self
            .inner
            .post(self.url(suffix))
            .headers(self.default_headers.clone())
            .json(body)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => Status::success(),
            Ok(r) => Status::transport(r.status().to_string(), format!("{suffix} rejected")),
            Err(e) => Status::transport("TRANSPORT_ERROR", e.to_string()),
        }
    }
}

/// Builder for [`HttpTableService`], mirroring the teacher's `ClientBuilder`.
#[must_use = "builders do nothing unless you call .build()"]
pub struct HttpTableServiceBuilder {
    base_url: String,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl HttpTableServiceBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_headers: HeaderMap::new(),
            timeout: None,
        }
    }

    pub fn default_header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (
            reqwest::header::HeaderName::from_bytes(key.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            self.default_headers.insert(name, val);
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpTableService, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(HttpTableService {
            inner: builder.build()?,
            base_url: self.base_url,
            default_headers: self.default_headers,
        })
    }
}
