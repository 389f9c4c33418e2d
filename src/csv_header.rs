//! Shared CSV/TSV header parsing: trailing-delimiter auto-detection and
//! header row extraction (§4 edge cases, P9).

use crate::error::ImportError;

/// Parses a header line into column names, auto-detecting a trailing
/// delimiter the way `removeLastDelimiter` does in the original parser: if
/// the line ends with the delimiter, that trailing delimiter is stripped
/// before splitting and the second return value is `true` — every data row
/// read afterwards must have the same trailing delimiter stripped via
/// [`strip_trailing_delimiter`].
pub fn parse_header(line: &str, delimiter: u8) -> (Vec<String>, bool) {
    let delim = delimiter as char;
    match line.strip_suffix(delim) {
        Some(stripped) => (stripped.split(delim).map(|s| s.to_string()).collect(), true),
        None => (line.split(delim).map(|s| s.to_string()).collect(), false),
    }
}

/// Resolves the header line the way `InitCsvParser` does: an explicit
/// `header_row` setting always wins over a physical header line consumed
/// from the file, but the physical line is still consumed first by the
/// caller whenever `header` is set (so `data_start` accounts for it either
/// way). Returns `None` when there is no header at all, meaning the caller
/// should fall back to the schema's own column order.
pub fn init_header(
    explicit: Option<&str>,
    physical_line: Option<String>,
    delimiter: u8,
) -> Option<(Vec<String>, bool)> {
    let source = match explicit {
        Some(row) => row.to_string(),
        None => physical_line?,
    };
    let trimmed = source.trim_end_matches(['\r', '\n']);
    Some(parse_header(trimmed, delimiter))
}

/// Strips a mandatory trailing delimiter from a data line before it is
/// handed to the CSV field splitter, mirroring `parse_header`'s treatment
/// of the header row.
pub fn strip_trailing_delimiter(line: &str, delimiter: u8, require_trailing: bool) -> Result<&str, ImportError> {
    if !require_trailing {
        return Ok(line);
    }
    line.strip_suffix(delimiter as char)
        .ok_or(ImportError::MissingTrailingDelimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_header() {
        let (header, remove_last) = parse_header("a,b,c", b',');
        assert_eq!(header, vec!["a", "b", "c"]);
        assert!(!remove_last);
    }

    #[test]
    fn trailing_delimiter_is_auto_detected_and_stripped() {
        let (header, remove_last) = parse_header("a,b,c,", b',');
        assert_eq!(header, vec!["a", "b", "c"]);
        assert!(remove_last);
    }

    #[test]
    fn explicit_header_row_wins_over_physical_line() {
        let (header, _) = init_header(Some("x,y"), Some("a,b\n".to_string()), b',').unwrap();
        assert_eq!(header, vec!["x", "y"]);
    }

    #[test]
    fn physical_line_is_used_when_no_explicit_header_row() {
        let (header, remove_last) = init_header(None, Some("a,b,\r\n".to_string()), b',').unwrap();
        assert_eq!(header, vec!["a", "b"]);
        assert!(remove_last);
    }

    #[test]
    fn no_header_source_returns_none() {
        assert!(init_header(None, None, b',').is_none());
    }

    #[test]
    fn missing_trailing_delimiter_is_an_error_when_required() {
        let err = strip_trailing_delimiter("a,b,c", b',', true).unwrap_err();
        assert!(matches!(err, ImportError::MissingTrailingDelimiter));
    }
}
