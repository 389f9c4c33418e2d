//! Newline-delimited JSON import (§4.5): simpler than the CSV paths since
//! there's no header or quoted-newline concern, batched against an
//! approximate cross-file inflight cap.

use crate::encoder::RowEncoder;
use crate::error::ImportError;
use crate::gateway::{FailureTracker, UpsertGateway};
use crate::progress::Progress;
use crate::schema::{TableSchema, TypedRowList};
use crate::settings::ImportFileSettings;
use crate::worker_pool::WorkerPool;
use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Approximates the JSON path's notion of a per-file cap without a full
/// [`crate::admission::JobInflightManager`]: `(total - 1) / current_file_count + 1`,
/// matching the original source's integer-division rounding. Decrementing
/// `open_files` only happens on drop, mirroring the original's destructor —
/// only JSON files release a share of the shared file count this way.
pub struct MaxInflightGetter {
    max_in_flight_requests: u32,
    open_files: Arc<AtomicUsize>,
}

impl MaxInflightGetter {
    pub fn new(max_in_flight_requests: u32, open_files: Arc<AtomicUsize>) -> Self {
        Self { max_in_flight_requests, open_files }
    }

    pub fn current_max(&self) -> u32 {
        let files = self.open_files.load(Ordering::SeqCst).max(1) as u32;
        (self.max_in_flight_requests.saturating_sub(1)) / files + 1
    }
}

impl Drop for MaxInflightGetter {
    fn drop(&mut self) {
        self.open_files.fetch_sub(1, Ordering::SeqCst);
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run_json_lines<R: Read + Send + 'static>(
    path: &str,
    settings: &ImportFileSettings,
    schema: Arc<TableSchema>,
    encoder: Arc<dyn RowEncoder>,
    gateway: Arc<UpsertGateway>,
    max_inflight: Arc<MaxInflightGetter>,
    worker_pool: WorkerPool,
    progress: Arc<Progress>,
    failures: Arc<FailureTracker>,
    reader: R,
) -> Result<(), ImportError> {
    let mut lines = BufReader::with_capacity(settings.file_buffer_size, reader).lines();
    let mut batch: Vec<String> = Vec::new();
    let mut batch_bytes: u64 = 0;
    let mut row_index: u64 = 0;
    let mut join_set = tokio::task::JoinSet::new();

    for line in lines.by_ref() {
        if failures.failed() {
            break;
        }
        let line = line?;
        progress.add_bytes(line.len() as u64 + 1);
        batch_bytes += line.len() as u64 + 1;
        row_index += 1;
        batch.push(line);

        if batch_bytes >= settings.bytes_per_request {
            dispatch(
                path, std::mem::take(&mut batch), row_index, &schema, &encoder, &gateway,
                max_inflight.current_max(), settings.binary_strings, &worker_pool, &failures, &mut join_set,
            )
            .await?;
            batch_bytes = 0;
        }
    }

    if !batch.is_empty() && !failures.failed() {
        dispatch(
            path, batch, row_index, &schema, &encoder, &gateway, max_inflight.current_max(),
            settings.binary_strings, &worker_pool, &failures, &mut join_set,
        )
        .await?;
    }

    while join_set.join_next().await.is_some() {}
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    path: &str,
    lines: Vec<String>,
    row_index: u64,
    schema: &Arc<TableSchema>,
    encoder: &Arc<dyn RowEncoder>,
    gateway: &Arc<UpsertGateway>,
    cap_hint: u32,
    binary_strings: crate::settings::BinaryStringsEncoding,
    worker_pool: &WorkerPool,
    failures: &Arc<FailureTracker>,
    join_set: &mut tokio::task::JoinSet<()>,
) -> Result<(), ImportError> {
    let start_row = row_index - lines.len() as u64;
    let schema = schema.clone();
    let encoder = encoder.clone();

    let rows = worker_pool
        .submit_blocking(move || build_row_list(&schema, &encoder, lines, start_row, binary_strings))
        .await??;

    // cap_hint bounds how many batches from this file are allowed to race
    // ahead of the gateway's own RPC-level admission control, mirroring
    // `WaitForQueue`: drain completed batches until the in-flight count
    // drops back under the cap before admitting another one.
    while join_set.len() >= cap_hint as usize {
        if join_set.join_next().await.is_none() {
            break;
        }
    }

    let gateway = gateway.clone();
    let path = path.to_string();
    let failures = failures.clone();
    join_set.spawn(async move {
        let status = gateway.upsert_rows(&path, &rows).await;
        failures.record(&status);
    });
    Ok(())
}

fn build_row_list(
    schema: &TableSchema,
    encoder: &Arc<dyn RowEncoder>,
    lines: Vec<String>,
    start_row: u64,
    binary_strings: crate::settings::BinaryStringsEncoding,
) -> Result<TypedRowList, ImportError> {
    let mut rows = Vec::with_capacity(lines.len());
    let mut serialized_bytes = 0u64;
    for (i, line) in lines.iter().enumerate() {
        serialized_bytes += line.len() as u64;
        let row = encoder.decode_json_record(schema, line, start_row + i as u64, binary_strings)?;
        rows.push(row);
    }
    Ok(TypedRowList { rows, serialized_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_inflight_rounds_like_the_original() {
        let getter = MaxInflightGetter::new(100, Arc::new(AtomicUsize::new(3)));
        assert_eq!(getter.current_max(), 34);
        let getter = MaxInflightGetter::new(1, Arc::new(AtomicUsize::new(1)));
        assert_eq!(getter.current_max(), 1);
    }

    #[test]
    fn drop_releases_the_shared_file_count() {
        let open_files = Arc::new(AtomicUsize::new(2));
        let getter = MaxInflightGetter::new(100, open_files.clone());
        drop(getter);
        assert_eq!(open_files.load(Ordering::SeqCst), 1);
    }
}
