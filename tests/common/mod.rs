//! Shared test fixtures: an in-memory `TableService` that records every
//! batch it receives, useful across the cross-component scenarios in §8.

use async_trait::async_trait;
use bulk_table_import::{
    ColumnSchema, ColumnType, Status, StoreType, TableDescription, TableSchema, TableService,
    TypedRowList,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct RecordingTableService {
    pub schema: TableSchema,
    pub received_rows: Mutex<Vec<TypedRowList>>,
    pub upsert_calls: AtomicUsize,
    pub fail_first_n_upserts: usize,
}

impl RecordingTableService {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            received_rows: Mutex::new(Vec::new()),
            upsert_calls: AtomicUsize::new(0),
            fail_first_n_upserts: 0,
        }
    }

    pub fn failing_first(schema: TableSchema, n: usize) -> Self {
        Self { fail_first_n_upserts: n, ..Self::new(schema) }
    }

    pub fn total_rows(&self) -> usize {
        self.received_rows.lock().unwrap().iter().map(|b| b.len()).sum()
    }
}

#[async_trait]
impl TableService for RecordingTableService {
    async fn describe_table(&self, path: &str) -> Result<TableDescription, Status> {
        Ok(TableDescription { path: path.to_string(), schema: self.schema.clone() })
    }

    async fn describe_path(&self, path: &str) -> Result<TableDescription, Status> {
        self.describe_table(path).await
    }

    async fn bulk_upsert_rows(&self, _path: &str, rows: &TypedRowList) -> Status {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first_n_upserts {
            return Status::transport("UNAVAILABLE", "retry me");
        }
        self.received_rows.lock().unwrap().push(rows.clone());
        Status::success()
    }

    async fn bulk_upsert_arrow(&self, _path: &str, _ipc_bytes: &[u8]) -> Status {
        Status::success()
    }
}

pub fn simple_schema() -> TableSchema {
    TableSchema {
        columns: vec![
            ColumnSchema { name: "id".into(), column_type: ColumnType::Int64, nullable: false },
            ColumnSchema { name: "name".into(), column_type: ColumnType::Utf8, nullable: true },
        ],
        primary_key: vec!["id".into()],
        store_type: StoreType::Row,
    }
}
