//! Status codes and error types for the bulk import core.

use std::fmt;
use thiserror::Error;

/// Status codes surfaced by the core (§6, §7).
///
/// `Success` and `BadRequest`/`SchemeError`/`InternalError` are produced
/// locally; any other variant is whatever the remote table service
/// returned after the retry policy gave up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    BadRequest,
    SchemeError,
    InternalError,
    /// A status propagated verbatim from the `TableService` collaborator,
    /// e.g. a transport-level or server-side RPC failure.
    Transport(String),
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Success => write!(f, "SUCCESS"),
            StatusCode::BadRequest => write!(f, "BAD_REQUEST"),
            StatusCode::SchemeError => write!(f, "SCHEME_ERROR"),
            StatusCode::InternalError => write!(f, "INTERNAL_ERROR"),
            StatusCode::Transport(code) => write!(f, "{code}"),
        }
    }
}

/// The result of one run, one file, one batch's upsert, or one
/// `DescribeTable`/`DescribePath` call.
#[derive(Clone, Debug)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn success() -> Self {
        Status { code: StatusCode::Success, message: String::new() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Status { code: StatusCode::BadRequest, message: message.into() }
    }

    pub fn scheme_error(message: impl Into<String>) -> Self {
        Status { code: StatusCode::SchemeError, message: message.into() }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Status { code: StatusCode::InternalError, message: message.into() }
    }

    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Status { code: StatusCode::Transport(code.into()), message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for Status {}

/// Internal failures raised while building or dispatching a batch.
///
/// These are caught at the driver-task boundary (§4.7 step 5: "Exceptions
/// from a worker map to `INTERNAL_ERROR`") and turned into a [`Status`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file does not exist: {path}")]
    FileNotFound { path: String },

    #[error("not a file: {path}")]
    NotAFile { path: String },

    #[error("illegal delimiter for TSV format, only tab is allowed")]
    IllegalTsvDelimiter,

    #[error("according to the header, lines should end with a delimiter")]
    MissingTrailingDelimiter,

    #[error("unsupported format #{0}")]
    UnsupportedFormat(u32),

    #[error("import into column table with Pg type columns is not supported")]
    PgTypeInColumnTable,

    #[error("parquet import is not supported on Windows")]
    ParquetOnWindows,

    #[error("file chunk number is too big")]
    ChunkOutOfRange,

    #[error("couldn't add worker func")]
    WorkerSubmissionFailed,

    #[error("row encoder error: {0}")]
    Encode(#[from] EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<ImportError> for Status {
    fn from(err: ImportError) -> Self {
        match &err {
            ImportError::FileNotFound { .. }
            | ImportError::NotAFile { .. }
            | ImportError::IllegalTsvDelimiter
            | ImportError::MissingTrailingDelimiter
            | ImportError::UnsupportedFormat(_)
            | ImportError::PgTypeInColumnTable
            | ImportError::ParquetOnWindows => Status::bad_request(err.to_string()),
            ImportError::ChunkOutOfRange
            | ImportError::WorkerSubmissionFailed
            | ImportError::Encode(_)
            | ImportError::Io(_)
            | ImportError::Other(_) => Status::internal_error(err.to_string()),
        }
    }
}

/// Errors from the opaque value-encoding capabilities (§1: CSV/JSON-to-row,
/// Arrow serialization). The core never constructs these itself; a
/// [`crate::encoder::RowEncoder`] implementation returns them.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    #[error("column {column} at row {row}: {message}")]
    InvalidValue { column: String, row: u64, message: String },

    #[error("json parse error at row {row}: {message}")]
    InvalidJson { row: u64, message: String },

    #[error("arrow serialization error: {0}")]
    Arrow(String),
}
