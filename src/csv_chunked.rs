//! Chunked CSV worker loop (§4.3b): one worker per chunk, each with its own
//! locally-owned permit pool sized as a fixed share of
//! `thread_count + max_in_flight_requests`.

use crate::csv_chunker::FileChunk;
use crate::csv_header::strip_trailing_delimiter;
use crate::encoder::RowEncoder;
use crate::error::ImportError;
use crate::gateway::{FailureTracker, UpsertGateway};
use crate::progress::Progress;
use crate::schema::{TableSchema, TypedRowList};
use crate::settings::ImportFileSettings;
use crate::worker_pool::WorkerPool;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs every chunk's worker loop to completion and returns the first
/// non-success status observed, or success. `header` and
/// `remove_last_delimiter` are already resolved by the caller (§4.3 step
/// 3's `InitCsvParser`-equivalent), so every chunk — including the one
/// covering the file's first data row — starts past the header/skip-row
/// region.
#[allow(clippy::too_many_arguments)]
pub async fn run_chunked_csv(
    path: &str,
    settings: &ImportFileSettings,
    schema: Arc<TableSchema>,
    encoder: Arc<dyn RowEncoder>,
    gateway: Arc<UpsertGateway>,
    worker_pool: WorkerPool,
    progress: Arc<Progress>,
    failures: Arc<FailureTracker>,
    chunks: Vec<FileChunk>,
    header: Vec<String>,
    remove_last_delimiter: bool,
) -> Result<(), ImportError> {
    let thread_count = chunks.len().max(1) as u32;
    let max_job_inflight_total = thread_count + settings.max_in_flight_requests;

    let mut handles = Vec::with_capacity(chunks.len());
    for (t, chunk) in chunks.into_iter().enumerate() {
        let local_cap = max_job_inflight_total / thread_count
            + if (t as u32) < max_job_inflight_total % thread_count { 1 } else { 0 };

        let path = path.to_string();
        let settings = settings.clone();
        let schema = schema.clone();
        let encoder = encoder.clone();
        let gateway = gateway.clone();
        let worker_pool = worker_pool.clone();
        let progress = progress.clone();
        let failures = failures.clone();
        let header = header.clone();

        handles.push(tokio::spawn(async move {
            run_chunk_worker(
                t, &path, &settings, schema, encoder, gateway, worker_pool, progress, failures, chunk,
                header, remove_last_delimiter, local_cap.max(1),
            )
            .await
        }));
    }

    for handle in handles {
        handle.await.map_err(|_| ImportError::WorkerSubmissionFailed)??;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_chunk_worker(
    thread_id: usize,
    path: &str,
    settings: &ImportFileSettings,
    schema: Arc<TableSchema>,
    encoder: Arc<dyn RowEncoder>,
    gateway: Arc<UpsertGateway>,
    worker_pool: WorkerPool,
    progress: Arc<Progress>,
    failures: Arc<FailureTracker>,
    chunk: FileChunk,
    header: Vec<String>,
    remove_last_delimiter: bool,
    local_cap: u32,
) -> Result<(), ImportError> {
    let started = std::time::Instant::now();
    let local_pool = Arc::new(Semaphore::new(local_cap as usize));
    let file = File::open(&settings.path)?;
    let mut reader = BufReader::with_capacity(settings.file_buffer_size, file);
    reader.seek(SeekFrom::Start(chunk.start))?;

    let mut take = reader.take(chunk.len());
    let mut line_buf = String::new();
    let read_bytes = Arc::new(AtomicU32::new(0));
    let mut row_index: u64 = 0;

    let mut join_set = tokio::task::JoinSet::new();
    let mut batch_lines: Vec<String> = Vec::new();
    let mut batch_bytes: u64 = 0;

    loop {
        line_buf.clear();
        let n = read_line(&mut take, &mut line_buf)?;
        if n == 0 {
            break;
        }
        if failures.failed() {
            break;
        }
        progress.add_bytes(n as u64);
        read_bytes.fetch_add(n as u32, Ordering::Relaxed);
        batch_bytes += n as u64;
        let line = strip_trailing_delimiter(
            line_buf.trim_end_matches('\n'),
            settings.delimiter,
            remove_last_delimiter,
        )?
        .to_string();
        batch_lines.push(line);
        row_index += 1;

        if batch_bytes >= settings.bytes_per_request {
            submit_chunk_batch(
                path, &header, std::mem::take(&mut batch_lines), settings, row_index,
                &schema, &encoder, &gateway, &local_pool, &worker_pool, &failures, &mut join_set,
            )
            .await?;
            batch_bytes = 0;
        }
    }

    if !batch_lines.is_empty() && !failures.failed() {
        submit_chunk_batch(
            path, &header, batch_lines, settings, row_index, &schema, &encoder, &gateway,
            &local_pool, &worker_pool, &failures, &mut join_set,
        )
        .await?;
    }

    while join_set.join_next().await.is_some() {}
    // drain the local pool: wait until every permit this worker started with is free again.
    let _ = local_pool.acquire_many(local_cap).await;

    if settings.verbose {
        let elapsed = started.elapsed().as_secs_f64().max(1e-6);
        let bytes = read_bytes.load(Ordering::Relaxed);
        tracing::info!(
            file = path,
            thread = thread_id,
            elapsed_secs = elapsed,
            rate_bytes_per_sec = bytes as f64 / elapsed,
            "chunk processed"
        );
    }
    Ok(())
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut String) -> std::io::Result<usize> {
    reader.read_line(buf)
}

#[allow(clippy::too_many_arguments)]
async fn submit_chunk_batch(
    path: &str,
    header: &[String],
    lines: Vec<String>,
    settings: &ImportFileSettings,
    row_index: u64,
    schema: &Arc<TableSchema>,
    encoder: &Arc<dyn RowEncoder>,
    gateway: &Arc<UpsertGateway>,
    local_pool: &Arc<Semaphore>,
    worker_pool: &WorkerPool,
    failures: &Arc<FailureTracker>,
    join_set: &mut tokio::task::JoinSet<()>,
) -> Result<(), ImportError> {
    let start_row = row_index - lines.len() as u64;
    let schema = schema.clone();
    let encoder = encoder.clone();
    let header = header.to_vec();
    let delim = settings.delimiter;
    let null_value = settings.null_value.clone();

    // §5: the chunked path submits to the shared worker pool non-blocking,
    // since each chunk thread already bounds its own concurrency through
    // `local_pool`. A saturated pool surfaces as a hard failure for the
    // whole file, mirroring `AddFunc`'s behavior in the original driver.
    let handle = worker_pool
        .try_submit(move || build_row_list(&schema, &encoder, &header, lines, delim, start_row, null_value.as_deref()))
        .ok_or(ImportError::WorkerSubmissionFailed)?;
    let rows = handle.await.map_err(|_| ImportError::WorkerSubmissionFailed)??;

    let permit = local_pool
        .clone()
        .acquire_owned()
        .await
        .expect("local chunk semaphore is never closed");
    let gateway = gateway.clone();
    let path = path.to_string();
    let failures = failures.clone();
    join_set.spawn(async move {
        let status = gateway.upsert_rows(&path, &rows).await;
        failures.record(&status);
        drop(permit);
    });
    Ok(())
}

fn build_row_list(
    schema: &TableSchema,
    encoder: &Arc<dyn RowEncoder>,
    header: &[String],
    lines: Vec<String>,
    delimiter: u8,
    start_row: u64,
    null_value: Option<&str>,
) -> Result<TypedRowList, ImportError> {
    let mut rows = Vec::with_capacity(lines.len());
    let mut serialized_bytes = 0u64;
    let delim = delimiter as char;
    for (i, line) in lines.iter().enumerate() {
        serialized_bytes += line.len() as u64;
        let fields: Vec<&str> = line.split(delim).collect();
        let row = encoder.decode_csv_record(schema, header, &fields, start_row + i as u64, null_value)?;
        rows.push(row);
    }
    Ok(TypedRowList { rows, serialized_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_cap_distributes_remainder_to_earlier_threads() {
        let thread_count = 3u32;
        let total = 10u32;
        let caps: Vec<u32> = (0..thread_count)
            .map(|t| total / thread_count + if t < total % thread_count { 1 } else { 0 })
            .collect();
        assert_eq!(caps, vec![4, 3, 3]);
        assert_eq!(caps.iter().sum::<u32>(), total);
    }
}
