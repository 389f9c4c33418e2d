//! Parquet import (§4.6): reads record batches by row-group, halving a
//! slice when its serialized size would exceed the byte budget.

use crate::error::ImportError;
use crate::gateway::{FailureTracker, UpsertGateway};
use crate::progress::Progress;
use crate::settings::ImportFileSettings;
use crate::worker_pool::WorkerPool;
#[cfg(feature = "parquet")]
use arrow_array::RecordBatch;
#[cfg(feature = "parquet")]
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
#[cfg(feature = "parquet")]
use std::fs::File;
use std::sync::Arc;

/// Reads every row group of `settings.path`, serializing slices to Arrow
/// IPC and halving a slice whenever it would exceed `bytes_per_request`
/// (§4.6's "logarithmic halving").
#[cfg(feature = "parquet")]
pub async fn run_parquet(
    path: &str,
    settings: &ImportFileSettings,
    gateway: Arc<UpsertGateway>,
    worker_pool: WorkerPool,
    progress: Arc<Progress>,
    failures: Arc<FailureTracker>,
) -> Result<(), ImportError> {
    if cfg!(windows) {
        return Err(ImportError::ParquetOnWindows);
    }

    let settings = settings.clone();
    let batches = worker_pool
        .submit_blocking(move || read_all_batches(&settings))
        .await??;

    let mut join_set = tokio::task::JoinSet::new();
    for batch in batches {
        if failures.failed() {
            break;
        }
        for slice in split_to_budget(&batch, settings.bytes_per_request)? {
            let ipc_bytes = worker_pool.submit_blocking(move || serialize_ipc(&slice)).await??;
            progress.add_bytes(ipc_bytes.len() as u64);
            let gateway = gateway.clone();
            let path = path.to_string();
            let failures = failures.clone();
            join_set.spawn(async move {
                let status = gateway.upsert_arrow(&path, &ipc_bytes).await;
                failures.record(&status);
            });
        }
    }
    while join_set.join_next().await.is_some() {}
    Ok(())
}

#[cfg(not(feature = "parquet"))]
pub async fn run_parquet(
    _path: &str,
    _settings: &ImportFileSettings,
    _gateway: Arc<UpsertGateway>,
    _worker_pool: WorkerPool,
    _progress: Arc<Progress>,
    _failures: Arc<FailureTracker>,
) -> Result<(), ImportError> {
    Err(ImportError::UnsupportedFormat(0))
}

#[cfg(feature = "parquet")]
fn read_all_batches(settings: &ImportFileSettings) -> Result<Vec<RecordBatch>, ImportError> {
    let file = File::open(&settings.path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| ImportError::Other(e.to_string()))?;
    let reader = builder.build().map_err(|e| ImportError::Other(e.to_string()))?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.map_err(|e| ImportError::Other(e.to_string()))?);
    }
    Ok(batches)
}

/// Recursively halves `batch` until every slice's serialized IPC size fits
/// under `budget`, or the slice is a single row (I3: a batch has at least
/// one row, so a single oversized row is sent as-is).
#[cfg(feature = "parquet")]
fn split_to_budget(batch: &RecordBatch, budget: u64) -> Result<Vec<RecordBatch>, ImportError> {
    let ipc_len = serialize_ipc(batch)?.len() as u64;
    if ipc_len <= budget || batch.num_rows() <= 1 {
        return Ok(vec![batch.clone()]);
    }
    let mid = batch.num_rows() / 2;
    let left = batch.slice(0, mid);
    let right = batch.slice(mid, batch.num_rows() - mid);
    let mut out = split_to_budget(&left, budget)?;
    out.extend(split_to_budget(&right, budget)?);
    Ok(out)
}

#[cfg(feature = "parquet")]
fn serialize_ipc(batch: &RecordBatch) -> Result<Vec<u8>, ImportError> {
    let mut buf = Vec::new();
    {
        let mut writer = arrow_ipc::writer::StreamWriter::try_new(&mut buf, &batch.schema())
            .map_err(|e| ImportError::Other(e.to_string()))?;
        writer.write(batch).map_err(|e| ImportError::Other(e.to_string()))?;
        writer.finish().map_err(|e| ImportError::Other(e.to_string()))?;
    }
    Ok(buf)
}

#[cfg(all(test, feature = "parquet"))]
mod tests {
    use super::*;
    use arrow_array::Int32Array;
    use arrow_schema::{DataType, Field, Schema};

    fn sample_batch(rows: usize) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int32, false)]));
        let values: Vec<i32> = (0..rows as i32).collect();
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values))]).unwrap()
    }

    #[test]
    fn small_batch_is_not_split() {
        let batch = sample_batch(4);
        let parts = split_to_budget(&batch, 1024 * 1024).unwrap();
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn oversized_batch_is_halved() {
        let batch = sample_batch(1000);
        let parts = split_to_budget(&batch, 64).unwrap();
        assert!(parts.len() > 1);
        let total: usize = parts.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 1000);
    }
}
