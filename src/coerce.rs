//! Text/JSON-to-`TypedValue` coercion helpers backing [`crate::encoder::DefaultRowEncoder`].

use crate::schema::{ColumnType, TypedValue};
use crate::settings::BinaryStringsEncoding;
use base64::Engine;

pub fn coerce_text(
    column_type: &ColumnType,
    raw: &str,
    nullable: bool,
    null_value: Option<&str>,
) -> Result<TypedValue, String> {
    let is_null = match null_value {
        Some(marker) => raw == marker,
        None => raw.is_empty(),
    };
    if is_null && nullable {
        return Ok(TypedValue::Null);
    }
    match column_type {
        ColumnType::Bool => raw
            .parse::<bool>()
            .map(TypedValue::Bool)
            .map_err(|e| e.to_string()),
        ColumnType::Int32 => raw
            .parse::<i32>()
            .map(TypedValue::Int32)
            .map_err(|e| e.to_string()),
        ColumnType::Int64 => raw
            .parse::<i64>()
            .map(TypedValue::Int64)
            .map_err(|e| e.to_string()),
        ColumnType::Uint32 => raw
            .parse::<u32>()
            .map(TypedValue::Uint32)
            .map_err(|e| e.to_string()),
        ColumnType::Uint64 => raw
            .parse::<u64>()
            .map(TypedValue::Uint64)
            .map_err(|e| e.to_string()),
        ColumnType::Double => raw
            .parse::<f64>()
            .map(TypedValue::Double)
            .map_err(|e| e.to_string()),
        ColumnType::Utf8 => Ok(TypedValue::Utf8(raw.to_string())),
        ColumnType::Bytes => Ok(TypedValue::Bytes(raw.as_bytes().to_vec())),
        ColumnType::Timestamp => raw
            .parse::<i64>()
            .map(TypedValue::Int64)
            .map_err(|e| e.to_string()),
        ColumnType::Pg(name) => Err(format!("Pg-compatible type {name} is not supported here")),
    }
}

pub fn coerce_json(
    column_type: &ColumnType,
    value: &serde_json::Value,
    nullable: bool,
    binary_strings: BinaryStringsEncoding,
) -> Result<TypedValue, String> {
    if value.is_null() && nullable {
        return Ok(TypedValue::Null);
    }
    match column_type {
        ColumnType::Bool => value
            .as_bool()
            .map(TypedValue::Bool)
            .ok_or_else(|| "expected a bool".to_string()),
        ColumnType::Int32 => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(TypedValue::Int32)
            .ok_or_else(|| "expected an i32".to_string()),
        ColumnType::Int64 => value
            .as_i64()
            .map(TypedValue::Int64)
            .ok_or_else(|| "expected an i64".to_string()),
        ColumnType::Uint32 => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(TypedValue::Uint32)
            .ok_or_else(|| "expected a u32".to_string()),
        ColumnType::Uint64 => value
            .as_u64()
            .map(TypedValue::Uint64)
            .ok_or_else(|| "expected a u64".to_string()),
        ColumnType::Double => value
            .as_f64()
            .map(TypedValue::Double)
            .ok_or_else(|| "expected a number".to_string()),
        ColumnType::Utf8 => value
            .as_str()
            .map(|s| TypedValue::Utf8(s.to_string()))
            .ok_or_else(|| "expected a string".to_string()),
        ColumnType::Bytes => {
            let s = value.as_str().ok_or_else(|| "expected a string".to_string())?;
            match binary_strings {
                BinaryStringsEncoding::Unicode => Ok(TypedValue::Bytes(s.as_bytes().to_vec())),
                BinaryStringsEncoding::Base64 => base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map(TypedValue::Bytes)
                    .map_err(|e| format!("invalid base64: {e}")),
            }
        }
        ColumnType::Timestamp => value
            .as_i64()
            .map(TypedValue::Int64)
            .ok_or_else(|| "expected an integer timestamp".to_string()),
        ColumnType::Pg(name) => Err(format!("Pg-compatible type {name} is not supported here")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_null_when_nullable() {
        assert_eq!(coerce_text(&ColumnType::Int32, "", true, None), Ok(TypedValue::Null));
    }

    #[test]
    fn custom_null_value_marker_is_respected() {
        assert_eq!(
            coerce_text(&ColumnType::Int32, "\\N", true, Some("\\N")),
            Ok(TypedValue::Null)
        );
        assert!(coerce_text(&ColumnType::Int32, "", true, Some("\\N")).is_err());
    }

    #[test]
    fn parses_int32() {
        assert_eq!(coerce_text(&ColumnType::Int32, "42", false, None), Ok(TypedValue::Int32(42)));
    }

    #[test]
    fn pg_type_is_rejected() {
        assert!(coerce_text(&ColumnType::Pg("pgint4".into()), "1", false, None).is_err());
    }

    #[test]
    fn base64_bytes_are_decoded_when_requested() {
        let value = serde_json::Value::String("aGVsbG8=".to_string());
        let decoded = coerce_json(&ColumnType::Bytes, &value, false, BinaryStringsEncoding::Base64).unwrap();
        assert_eq!(decoded, TypedValue::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn unicode_bytes_pass_through_as_raw_utf8() {
        let value = serde_json::Value::String("hello".to_string());
        let decoded = coerce_json(&ColumnType::Bytes, &value, false, BinaryStringsEncoding::Unicode).unwrap();
        assert_eq!(decoded, TypedValue::Bytes(b"hello".to_vec()));
    }
}
