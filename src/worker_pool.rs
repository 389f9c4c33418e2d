//! Shared CPU-bound worker pool (§5): bounded `spawn_blocking` slots for
//! building typed-row batches out of raw CSV/JSON/Parquet bytes.

use crate::error::ImportError;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounds how many blocking builder tasks run concurrently, independent of
/// the per-file/per-RPC admission control in [`crate::admission`].
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(threads: u32) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(threads.max(1) as usize)) }
    }

    /// Submit a CPU-bound closure, blocking the caller until a slot is free
    /// and the closure completes. This is the mode the non-chunked CSV and
    /// JSON line processors use (§5: "blocking submission").
    pub async fn submit_blocking<F, T>(&self, f: F) -> Result<T, ImportError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed");
        tokio::task::spawn_blocking(move || {
            let result = f();
            drop(permit);
            result
        })
        .await
        .map_err(|_| ImportError::WorkerSubmissionFailed)
    }

    /// Submit a CPU-bound closure without waiting for a free slot, returning
    /// immediately if the pool is saturated. Used by the chunked CSV path's
    /// local per-thread semaphores (§4.3b), which gate admission themselves.
    pub fn try_submit<F, T>(&self, f: F) -> Option<tokio::task::JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(tokio::task::spawn_blocking(move || {
            let result = f();
            drop(permit);
            result
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_blocking_runs_closure() {
        let pool = WorkerPool::new(2);
        let result = pool.submit_blocking(|| 1 + 1).await.unwrap();
        assert_eq!(result, 2);
    }
}
