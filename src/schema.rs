//! Table schema and typed-row types exchanged with the `TableService` (§6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column type as reported by `DescribeTable` (§6).
///
/// `Pg` represents a Postgres-compatibility column type (e.g. `pgint4`);
/// `TableSchema`s carrying one are rejected up front for column tables
/// (§4.7 step 3.5, `ValidateTValueUpsertTable` in the original source).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Double,
    Utf8,
    Bytes,
    Timestamp,
    Pg(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// How the destination table stores its data — row-oriented ("row table")
/// or column-oriented ("column table"). Only column tables are subject to
/// the Pg-type restriction (§4.7 step 3.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreType {
    Row,
    Column,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
    pub primary_key: Vec<String>,
    pub store_type: StoreType,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// True if this is a column table with at least one Pg-typed column
    /// (§4.7 step 3.5).
    pub fn has_disallowed_pg_column(&self) -> bool {
        self.store_type == StoreType::Column
            && self
                .columns
                .iter()
                .any(|c| matches!(c.column_type, ColumnType::Pg(_)))
    }
}

/// Result of a successful `DescribeTable`/`DescribePath` call (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableDescription {
    pub path: String,
    pub schema: TableSchema,
}

/// One typed row, keyed by column name, ready for `BulkUpsert` (§1, §6).
///
/// The core never constructs the column values itself — a [`crate::encoder::RowEncoder`]
/// does, from CSV text, JSON text, or an Arrow record batch.
#[derive(Clone, Debug, Default)]
pub struct TypedRow {
    pub values: HashMap<String, TypedValue>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Double(f64),
    Utf8(String),
    Bytes(Vec<u8>),
}

/// A batch of rows destined for a single `BulkUpsert` call, plus the byte
/// size it was budgeted against (§4.1 I3: a batch contains at least one row).
#[derive(Clone, Debug, Default)]
pub struct TypedRowList {
    pub rows: Vec<TypedRow>,
    pub serialized_bytes: u64,
}

impl TypedRowList {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
