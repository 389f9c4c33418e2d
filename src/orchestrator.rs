//! The top-level driver (§4.7): resolves table schema, validates it,
//! routes each file to the matching import path, and aggregates the first
//! failure across the whole run.

use crate::admission::JobInflightGroup;
use crate::client::TableService;
use crate::csv_chunked::run_chunked_csv;
use crate::csv_chunker::build_chunks;
use crate::csv_header::init_header;
use crate::csv_stream::run_csv_stream;
use crate::encoder::{DefaultRowEncoder, RowEncoder};
use crate::error::{ImportError, Status};
use crate::gateway::{FailureTracker, UpsertGateway};
use crate::json_import::{run_json_lines, MaxInflightGetter};
use crate::progress::Progress;
use crate::retry::RetryConfig;
use crate::schema::TableSchema;
use crate::settings::{DataFormat, ImportFileSettings};
use crate::worker_pool::WorkerPool;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Coordinates an import run against one or more files into the same
/// table. Construct with a [`TableService`]; drive with [`ImportClient::import_files`].
pub struct ImportClient {
    service: Arc<dyn TableService>,
    encoder: Arc<dyn RowEncoder>,
}

impl ImportClient {
    pub fn new(service: Arc<dyn TableService>) -> Self {
        Self { service, encoder: Arc::new(DefaultRowEncoder) }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn RowEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Import every file in `files` into `table_path`, using each file's
    /// own [`ImportFileSettings`]. Returns the run's aggregate [`Status`]
    /// (§4.7 step 6, I4): success iff every batch of every file succeeded.
    pub async fn import_files(&self, table_path: &str, files: Vec<ImportFileSettings>) -> Status {
        let schema = match self.resolve_schema(table_path).await {
            Ok(schema) => schema,
            Err(status) => return status,
        };

        if schema.has_disallowed_pg_column() {
            return Status::bad_request("import into column table with Pg type columns is not supported");
        }
        let schema = Arc::new(schema);

        let total_bytes: u64 = files
            .iter()
            .filter_map(|f| std::fs::metadata(&f.path).ok())
            .map(|m| m.len())
            .sum();
        let progress = Arc::new(Progress::new(Some(total_bytes), files.iter().any(|f| f.verbose)));
        let failures = Arc::new(FailureTracker::default());

        let max_in_flight_requests = files
            .iter()
            .map(|f| f.max_in_flight_requests)
            .max()
            .unwrap_or(100);
        let rpc_inflight = crate::admission::RpcInflight::new(max_in_flight_requests);
        let threads = files.iter().map(|f| f.threads).max().unwrap_or(4);
        let worker_pool = WorkerPool::new(threads);
        let verbose = files.iter().any(|f| f.verbose);
        let max_retries = files.iter().map(|f| f.max_retries).max().unwrap_or(crate::retry::DEFAULT_MAX_RETRIES);
        let operation_timeout = files
            .iter()
            .map(|f| f.operation_timeout)
            .max()
            .unwrap_or(std::time::Duration::from_secs(600));
        let client_timeout = files
            .iter()
            .map(|f| f.client_timeout)
            .max()
            .unwrap_or(std::time::Duration::from_secs(60));
        let retry = RetryConfig::new().with_max_retries(max_retries).with_verbose(verbose);
        let gateway = Arc::new(UpsertGateway::new(
            self.service.clone(),
            rpc_inflight,
            retry,
            operation_timeout,
            client_timeout,
        ));

        // Only CSV/TSV files that skip the chunked path (§4.4) admit their
        // batches through a JobInflightManager; everything else (chunked
        // CSV, JSON, Parquet) has its own admission scheme.
        let job_inflight_file_count = files
            .iter()
            .filter(|f| matches!(f.format, DataFormat::Csv | DataFormat::Tsv) && !f.newline_delimited)
            .count() as u32;
        let job_inflight_group = JobInflightGroup::new(threads, max_in_flight_requests, job_inflight_file_count);

        let open_files = Arc::new(AtomicUsize::new(files.len()));

        let mut handles = Vec::with_capacity(files.len());
        let mut next_order_num = 0usize;
        for settings in files {
            let order_num = if matches!(settings.format, DataFormat::Csv | DataFormat::Tsv)
                && !settings.newline_delimited
            {
                let order_num = next_order_num;
                next_order_num += 1;
                Some(order_num)
            } else {
                None
            };

            let table_path = table_path.to_string();
            let schema = schema.clone();
            let encoder = self.encoder.clone();
            let gateway = gateway.clone();
            let worker_pool = worker_pool.clone();
            let progress = progress.clone();
            let failures = failures.clone();
            let open_files = open_files.clone();
            let job_inflight_group = job_inflight_group.clone();

            handles.push(tokio::spawn(async move {
                let result = import_one_file(
                    &table_path, &settings, schema, encoder, gateway, worker_pool, progress,
                    failures.clone(), job_inflight_group, order_num, open_files,
                )
                .await;
                if let Err(err) = result {
                    failures.record(&Status::from(err));
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        progress.finish();

        match failures.first_error() {
            Some(status) => status,
            None => Status::success(),
        }
    }

    /// DescribeTable with a SCHEME_ERROR fallback to DescribePath (§4.7 step 3).
    async fn resolve_schema(&self, table_path: &str) -> Result<TableSchema, Status> {
        match self.service.describe_table(table_path).await {
            Ok(desc) => Ok(desc.schema),
            Err(status) if status.code == crate::error::StatusCode::SchemeError => {
                match self.service.describe_path(table_path).await {
                    Ok(desc) => Ok(desc.schema),
                    Err(path_status) => Err(Status::scheme_error(format!(
                        "{}{table_path}",
                        path_status.message
                    ))),
                }
            }
            Err(status) => Err(status),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn import_one_file(
    table_path: &str,
    settings: &ImportFileSettings,
    schema: Arc<TableSchema>,
    encoder: Arc<dyn RowEncoder>,
    gateway: Arc<UpsertGateway>,
    worker_pool: WorkerPool,
    progress: Arc<Progress>,
    failures: Arc<FailureTracker>,
    job_inflight_group: Arc<JobInflightGroup>,
    order_num: Option<usize>,
    open_files: Arc<AtomicUsize>,
) -> Result<(), ImportError> {
    if !settings.path.exists() {
        return Err(ImportError::FileNotFound { path: settings.path.display().to_string() });
    }
    if !settings.path.is_file() {
        return Err(ImportError::NotAFile { path: settings.path.display().to_string() });
    }

    match settings.format {
        DataFormat::Parquet => {
            crate::parquet_import::run_parquet(table_path, settings, gateway, worker_pool, progress, failures).await
        }
        DataFormat::JsonLines => {
            let file = File::open(&settings.path)?;
            let max_inflight = Arc::new(MaxInflightGetter::new(settings.max_in_flight_requests, open_files));
            run_json_lines(
                table_path, settings, schema, encoder, gateway, max_inflight, worker_pool, progress, failures, file,
            )
            .await
        }
        DataFormat::Csv | DataFormat::Tsv => {
            let seekable = true;
            if settings.newline_delimited && seekable {
                let current_file_count = open_files.load(Ordering::SeqCst).max(1) as u32;
                import_chunked_csv(
                    table_path, settings, schema, encoder, gateway, worker_pool, progress, failures,
                    current_file_count,
                )
                .await
            } else {
                let file = File::open(&settings.path)?;
                let order_num = order_num.expect("non-chunked CSV/TSV files are always assigned an order_num");
                run_csv_stream(
                    table_path, settings, schema, encoder, gateway, job_inflight_group, order_num, worker_pool,
                    progress, failures, file,
                )
                .await
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn import_chunked_csv(
    table_path: &str,
    settings: &ImportFileSettings,
    schema: Arc<TableSchema>,
    encoder: Arc<dyn RowEncoder>,
    gateway: Arc<UpsertGateway>,
    worker_pool: WorkerPool,
    progress: Arc<Progress>,
    failures: Arc<FailureTracker>,
    current_file_count: u32,
) -> Result<(), ImportError> {
    let mut file = File::open(&settings.path)?;
    let mut data_start = 0u64;
    let mut reader = BufReader::with_capacity(settings.file_buffer_size, &mut file);

    let physical_line = if settings.header {
        let mut first_line = String::new();
        let n = reader.read_line(&mut first_line)?;
        data_start += n as u64;
        Some(first_line)
    } else {
        None
    };
    let (header, remove_last_delimiter) =
        match init_header(settings.header_row.as_deref(), physical_line, settings.delimiter) {
            Some((header, remove_last_delimiter)) => (header, remove_last_delimiter),
            None => (schema.columns.iter().map(|c| c.name.clone()).collect(), false),
        };

    for _ in 0..settings.skip_rows {
        let mut skipped = String::new();
        let n = reader.read_line(&mut skipped)?;
        if n == 0 {
            break;
        }
        data_start += n as u64;
    }
    drop(reader);

    // §C.6: one huge file shouldn't claim the whole worker pool while
    // siblings starve — cap this file's chunk count to an equal share of
    // `threads` across currently-open files.
    let max_threads = (settings.threads / current_file_count).max(1);
    let chunks = build_chunks(&mut file, data_start, max_threads, settings.bytes_per_request)?;
    run_chunked_csv(
        table_path, settings, schema, encoder, gateway, worker_pool, progress, failures, chunks, header,
        remove_last_delimiter,
    )
    .await
}
