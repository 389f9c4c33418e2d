//! Opaque value-encoding capabilities (§1): turning CSV/JSON text into typed
//! rows, and Arrow record batches into IPC bytes. The core treats these as
//! swappable collaborators, never as its own orchestration logic — see
//! spec.md's explicit framing under OUT OF SCOPE.

use crate::error::EncodeError;
use crate::schema::{TableSchema, TypedRow};
use crate::settings::BinaryStringsEncoding;

/// Converts already-split CSV/TSV fields, or one JSON-lines record, into a
/// [`TypedRow`] against a known [`TableSchema`]. A `DefaultRowEncoder` is
/// provided for the common cases; callers with richer type-coercion needs
/// (e.g. locale-aware date parsing) can supply their own.
pub trait RowEncoder: Send + Sync {
    /// Decode one CSV/TSV record (already delimiter-split into fields, in
    /// header order) into a typed row. `null_value`, when set, is the text
    /// marker (e.g. `\N`) that stands for SQL NULL in nullable columns,
    /// taking precedence over the default empty-field convention.
    fn decode_csv_record(
        &self,
        schema: &TableSchema,
        header: &[String],
        fields: &[&str],
        row_index: u64,
        null_value: Option<&str>,
    ) -> Result<TypedRow, EncodeError>;

    /// Decode one JSON-lines record into a typed row. `binary_strings`
    /// controls how `Bytes` columns are read back out of JSON strings.
    fn decode_json_record(
        &self,
        schema: &TableSchema,
        line: &str,
        row_index: u64,
        binary_strings: BinaryStringsEncoding,
    ) -> Result<TypedRow, EncodeError>;
}

/// Straightforward encoder: CSV fields are matched to columns by header
/// position, JSON objects are matched by key, and values are coerced with
/// the obvious `FromStr`/numeric conversions. Sufficient for the common
/// ingestion case; swap in a custom [`RowEncoder`] for anything fancier.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRowEncoder;

impl RowEncoder for DefaultRowEncoder {
    fn decode_csv_record(
        &self,
        schema: &TableSchema,
        header: &[String],
        fields: &[&str],
        row_index: u64,
        null_value: Option<&str>,
    ) -> Result<TypedRow, EncodeError> {
        if header.len() != fields.len() {
            return Err(EncodeError::InvalidValue {
                column: String::new(),
                row: row_index,
                message: format!(
                    "expected {} fields, found {}",
                    header.len(),
                    fields.len()
                ),
            });
        }

        let mut row = TypedRow::default();
        for (name, raw) in header.iter().zip(fields.iter()) {
            let Some(col) = schema.column(name) else {
                continue;
            };
            let value = crate::coerce::coerce_text(&col.column_type, raw, col.nullable, null_value)
                .map_err(|message| EncodeError::InvalidValue {
                    column: name.clone(),
                    row: row_index,
                    message,
                })?;
            row.values.insert(name.clone(), value);
        }
        Ok(row)
    }

    fn decode_json_record(
        &self,
        schema: &TableSchema,
        line: &str,
        row_index: u64,
        binary_strings: BinaryStringsEncoding,
    ) -> Result<TypedRow, EncodeError> {
        let parsed: serde_json::Value =
            serde_json::from_str(line).map_err(|e| EncodeError::InvalidJson {
                row: row_index,
                message: e.to_string(),
            })?;
        let obj = parsed
            .as_object()
            .ok_or_else(|| EncodeError::InvalidJson {
                row: row_index,
                message: "expected a JSON object per line".to_string(),
            })?;

        let mut row = TypedRow::default();
        for col in &schema.columns {
            let Some(json_value) = obj.get(&col.name) else {
                continue;
            };
            let value = crate::coerce::coerce_json(&col.column_type, json_value, col.nullable, binary_strings)
                .map_err(|message| EncodeError::InvalidValue {
                    column: col.name.clone(),
                    row: row_index,
                    message,
                })?;
            row.values.insert(col.name.clone(), value);
        }
        Ok(row)
    }
}
