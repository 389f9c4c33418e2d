//! Single-stream CSV/TSV import (§4.4): used whenever the file is not
//! newline-delimited-safe for chunking, or isn't seekable. Batches are
//! admitted through the cross-file [`JobInflightGroup`].

use crate::admission::{JobInflightGroup, JobInflightManager};
use crate::csv_header::{init_header, strip_trailing_delimiter};
use crate::encoder::RowEncoder;
use crate::error::ImportError;
use crate::gateway::{FailureTracker, UpsertGateway};
use crate::progress::Progress;
use crate::schema::{TableSchema, TypedRowList};
use crate::settings::ImportFileSettings;
use crate::worker_pool::WorkerPool;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

/// Reads `reader` line by line, building byte-budgeted batches and
/// dispatching each through `gateway`, bounded by this file's manager in
/// `group` (I2). Returns once the stream is exhausted or the run has failed.
#[allow(clippy::too_many_arguments)]
pub async fn run_csv_stream<R: Read + Send + 'static>(
    path: &str,
    settings: &ImportFileSettings,
    schema: Arc<TableSchema>,
    encoder: Arc<dyn RowEncoder>,
    gateway: Arc<UpsertGateway>,
    group: Arc<JobInflightGroup>,
    order_num: usize,
    worker_pool: WorkerPool,
    progress: Arc<Progress>,
    failures: Arc<FailureTracker>,
    reader: R,
) -> Result<(), ImportError> {
    let job_mgr = group.manager(order_num);
    let mut lines = BufReader::with_capacity(settings.file_buffer_size, reader).lines();

    let physical_line = if settings.header {
        match lines.next() {
            Some(line) => Some(line?),
            None => {
                group.finish(order_num);
                return Ok(());
            }
        }
    } else {
        None
    };

    let (header, remove_last_delimiter) =
        match init_header(settings.header_row.as_deref(), physical_line, settings.delimiter) {
            Some((header, remove_last_delimiter)) => (header, remove_last_delimiter),
            None => (schema.columns.iter().map(|c| c.name.clone()).collect(), false),
        };

    for _ in 0..settings.skip_rows {
        if lines.next().is_none() {
            group.finish(order_num);
            return Ok(());
        }
    }

    let mut batch_lines: Vec<String> = Vec::new();
    let mut batch_bytes: u64 = 0;
    let mut row_index: u64 = 0;
    let mut join_set = tokio::task::JoinSet::new();

    for line in lines {
        if failures.failed() {
            break;
        }
        let line = line?;
        let line = strip_trailing_delimiter(&line, settings.delimiter, remove_last_delimiter)?.to_string();
        progress.add_bytes(line.len() as u64 + 1);
        batch_bytes += line.len() as u64 + 1;
        batch_lines.push(line);
        row_index += 1;

        if batch_bytes >= settings.bytes_per_request {
            dispatch_batch(
                path,
                &header,
                std::mem::take(&mut batch_lines),
                settings,
                row_index,
                &schema,
                &encoder,
                &gateway,
                &job_mgr,
                &worker_pool,
                &failures,
                &mut join_set,
            )
            .await?;
            batch_bytes = 0;
        }
    }

    if !batch_lines.is_empty() && !failures.failed() {
        dispatch_batch(
            path,
            &header,
            batch_lines,
            settings,
            row_index,
            &schema,
            &encoder,
            &gateway,
            &job_mgr,
            &worker_pool,
            &failures,
            &mut join_set,
        )
        .await?;
    }

    while join_set.join_next().await.is_some() {}
    group.finish(order_num);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_batch(
    path: &str,
    header: &[String],
    lines: Vec<String>,
    settings: &ImportFileSettings,
    row_index: u64,
    schema: &Arc<TableSchema>,
    encoder: &Arc<dyn RowEncoder>,
    gateway: &Arc<UpsertGateway>,
    job_mgr: &Arc<JobInflightManager>,
    worker_pool: &WorkerPool,
    failures: &Arc<FailureTracker>,
    join_set: &mut tokio::task::JoinSet<()>,
) -> Result<(), ImportError> {
    let start_row = row_index - lines.len() as u64;
    let schema = schema.clone();
    let encoder = encoder.clone();
    let delim = settings.delimiter;
    let header = header.to_vec();
    let null_value = settings.null_value.clone();

    let rows = worker_pool
        .submit_blocking(move || build_row_list(&schema, &encoder, &header, lines, delim, start_row, null_value.as_deref()))
        .await??;

    let permit = job_mgr.acquire_job().await;
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
