//! Idempotent retry gateway wrapping `BulkUpsert` (§4.2).

use crate::admission::RpcInflight;
use crate::client::TableService;
use crate::error::{Status, StatusCode};
use crate::retry::RetryConfig;
use crate::schema::TypedRowList;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps one `TableService` with admission control and retry/backoff.
/// Every call acquires an RPC permit for its duration, retries transient
/// failures per `RetryConfig`, and always releases the permit — even on
/// panic unwinding through the `?` operator, since the permit is RAII.
pub struct UpsertGateway {
    service: Arc<dyn TableService>,
    rpc_inflight: Arc<RpcInflight>,
    retry: RetryConfig,
    operation_timeout: Duration,
    client_timeout: Duration,
}

/// Sticky failure state for a run: the first error observed, and whether
/// any batch has failed (§4.7's "run succeeds iff every batch succeeded",
/// I4).
#[derive(Default)]
pub struct FailureTracker {
    failed: AtomicBool,
    first_error: std::sync::Mutex<Option<Status>>,
}

impl FailureTracker {
    pub fn record(&self, status: &Status) {
        if status.is_success() {
            return;
        }
        if !self.failed.swap(true, Ordering::SeqCst) {
            *self.first_error.lock().expect("failure tracker poisoned") = Some(status.clone());
        }
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn first_error(&self) -> Option<Status> {
        self.first_error.lock().expect("failure tracker poisoned").clone()
    }
}

impl UpsertGateway {
    pub fn new(
        service: Arc<dyn TableService>,
        rpc_inflight: Arc<RpcInflight>,
        retry: RetryConfig,
        operation_timeout: Duration,
        client_timeout: Duration,
    ) -> Self {
        Self { service, rpc_inflight, retry, operation_timeout, client_timeout }
    }

    /// Upsert one typed-row batch, retrying transient failures.
    pub async fn upsert_rows(&self, path: &str, rows: &TypedRowList) -> Status {
        self.retrying(|| self.service.bulk_upsert_rows(path, rows)).await
    }

    /// Upsert one Arrow-serialized batch, retrying transient failures.
    pub async fn upsert_arrow(&self, path: &str, ipc_bytes: &[u8]) -> Status {
        self.retrying(|| self.service.bulk_upsert_arrow(path, ipc_bytes)).await
    }

    /// Retries transient failures with backoff, bounding each attempt by
    /// `client_timeout` and the whole sequence of attempts by
    /// `operation_timeout` (§6).
    async fn retrying<'a, F, Fut>(&'a self, call: F) -> Status
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Status> + 'a,
    {
        let _permit = self.rpc_inflight.acquire().await;
        let started = tokio::time::Instant::now();

        let mut attempt = 0u32;
        let mut delay = Duration::ZERO;
        loop {
            let status = match tokio::time::timeout(self.client_timeout, call()).await {
                Ok(status) => status,
                Err(_) => Status::transport("DEADLINE_EXCEEDED", "upsert timed out"),
            };
            let operation_budget_exhausted = started.elapsed() >= self.operation_timeout;
            if status.is_success()
                || !is_retryable(&status.code)
                || !self.retry.should_retry(attempt)
                || operation_budget_exhausted
            {
                return status;
            }
            delay = self.retry.next_backoff(attempt, delay);
            if self.retry.verbose {
                tracing::debug!(attempt, ?delay, status = %status, "retrying upsert");
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn is_retryable(code: &StatusCode) -> bool {
    !matches!(code, StatusCode::BadRequest | StatusCode::SchemeError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableDescription;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct FlakyService {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TableService for FlakyService {
        async fn describe_table(&self, _path: &str) -> Result<TableDescription, Status> {
            unimplemented!()
        }
        async fn describe_path(&self, _path: &str) -> Result<TableDescription, Status> {
            unimplemented!()
        }
        async fn bulk_upsert_rows(&self, _path: &str, _rows: &TypedRowList) -> Status {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Status::transport("UNAVAILABLE", "try again")
            } else {
                Status::success()
            }
        }
        async fn bulk_upsert_arrow(&self, _path: &str, _ipc_bytes: &[u8]) -> Status {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let service: Arc<dyn TableService> = Arc::new(FlakyService {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        });
        let gateway = UpsertGateway::new(
            service,
            RpcInflight::new(4),
            RetryConfig::new().with_initial_backoff(Duration::from_millis(1)),
            Duration::from_secs(60),
            Duration::from_secs(10),
        );
        let status = gateway.upsert_rows("/t", &TypedRowList::default()).await;
        assert!(status.is_success());
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        struct AlwaysBadRequest;
        #[async_trait]
        impl TableService for AlwaysBadRequest {
            async fn describe_table(&self, _path: &str) -> Result<TableDescription, Status> {
                unimplemented!()
            }
            async fn describe_path(&self, _path: &str) -> Result<TableDescription, Status> {
                unimplemented!()
            }
            async fn bulk_upsert_rows(&self, _path: &str, _rows: &TypedRowList) -> Status {
                Status::bad_request("nope")
            }
            async fn bulk_upsert_arrow(&self, _path: &str, _ipc_bytes: &[u8]) -> Status {
                unimplemented!()
            }
        }
        let gateway = UpsertGateway::new(
            Arc::new(AlwaysBadRequest),
            RpcInflight::new(4),
            RetryConfig::new(),
            Duration::from_secs(60),
            Duration::from_secs(10),
        );
        let status = gateway.upsert_rows("/t", &TypedRowList::default()).await;
        assert_eq!(status.code, StatusCode::BadRequest);
    }
}
