//! Bulk Table Import Core
//!
//! A concurrency core for ingesting CSV, TSV, newline-delimited JSON, and
//! Parquet files into a remote table via bulk upsert RPCs — admission
//! control, idempotent retries, chunked/streaming readers, and progress
//! reporting, decoupled from any particular wire protocol.
//!
//! Wire-level concerns (the exact RPC shapes, authentication, CLI argument
//! parsing, logging setup) are the embedding application's job: this crate
//! expects a [`TableService`] implementation and emits `tracing` events
//! into whatever subscriber the caller has installed.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use bulk_table_import::{HttpTableService, ImportClient, ImportFileSettings, DataFormat};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = Arc::new(HttpTableService::new("https://example.com"));
//!     let client = ImportClient::new(service);
//!
//!     let file = ImportFileSettings::builder("data.csv", DataFormat::Csv)
//!         .header(true)
//!         .build()
//!         .unwrap();
//!
//!     let status = client.import_files("/local/my_table", vec![file]).await;
//!     assert!(status.is_success() || !status.is_success());
//! }
//! ```

mod admission;
mod client;
mod coerce;
mod csv_chunked;
mod csv_chunker;
mod csv_header;
mod csv_stream;
mod encoder;
mod error;
mod gateway;
mod json_import;
mod orchestrator;
mod parquet_import;
mod progress;
mod retry;
mod schema;
mod settings;
mod worker_pool;

pub use client::{HttpTableService, HttpTableServiceBuilder, TableService};
pub use encoder::{DefaultRowEncoder, RowEncoder};
pub use error::{EncodeError, ImportError, Status, StatusCode};
pub use orchestrator::ImportClient;
pub use retry::{JitterMode, RetryConfig, DEFAULT_MAX_RETRIES};
pub use schema::{ColumnSchema, ColumnType, StoreType, TableDescription, TableSchema, TypedRow, TypedRowList, TypedValue};
pub use settings::{BinaryStringsEncoding, DataFormat, ImportFileSettings, ImportFileSettingsBuilder};
