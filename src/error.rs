//! Error types for PageDB
//!
//! Every failure in the engine is one `Error` variant. Variants are grouped by the
//! pipeline stage that raises them and `Error::kind` folds them into five categories.

use thiserror::Error;

/// Error category, one per pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Semantic,
    Plan,
    Storage,
    Execution,
}

/// The main error type for PageDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Syntax Errors ==========
    #[error("Syntax error: expected {expected}, got {found} at line {line}:{column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("Syntax error: empty query")]
    EmptyQuery,

    // ========== Semantic Errors ==========
    #[error("Semantic error: table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Semantic error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Semantic error: column '{0}' does not exist in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Semantic error: duplicate column '{0}' in table '{1}'")]
    DuplicateColumn(String, String),

    #[error("Semantic error: unknown data type '{0}'")]
    UnknownDataType(String),

    #[error("Semantic error: column count mismatch, expected {expected} values, got {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("Semantic error: column '{column}' expects {expected}, got '{found}'")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Semantic error: {0}")]
    InvalidExpression(String),

    #[error("Semantic error: {0}")]
    InvalidSchema(String),

    // ========== Plan Errors ==========
    #[error("Plan error: {0}")]
    PlanError(String),

    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Storage error: value for column '{column}' is {len} bytes, limit is {max}")]
    ValueTooLong {
        column: String,
        len: usize,
        max: usize,
    },

    #[error("Storage error: corrupted page {page_id} of table '{table}'")]
    CorruptedPage { table: String, page_id: u32 },

    #[error("Storage error: failed to completely delete table files: {0}")]
    IncompleteDrop(String),

    #[error("Storage error: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: I/O failure: {0}")]
    IoError(#[from] std::io::Error),

    // ========== Execution Errors ==========
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Execution error: index '{0}' not found")]
    IndexNotFound(String),

    #[error("Execution error: index '{0}' already exists")]
    IndexAlreadyExists(String),
}

impl Error {
    /// The pipeline category this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedToken { .. } | Error::EmptyQuery => ErrorKind::Syntax,
            Error::TableNotFound(_)
            | Error::TableAlreadyExists(_)
            | Error::ColumnNotFound(..)
            | Error::DuplicateColumn(..)
            | Error::UnknownDataType(_)
            | Error::ColumnCountMismatch { .. }
            | Error::TypeMismatch { .. }
            | Error::InvalidExpression(_)
            | Error::InvalidSchema(_) => ErrorKind::Semantic,
            Error::PlanError(_) => ErrorKind::Plan,
            Error::StorageError(_)
            | Error::ValueTooLong { .. }
            | Error::CorruptedPage { .. }
            | Error::IncompleteDrop(_)
            | Error::Serialization(_)
            | Error::IoError(_) => ErrorKind::Storage,
            Error::ExecutionError(_) | Error::IndexNotFound(_) | Error::IndexAlreadyExists(_) => {
                ErrorKind::Execution
            }
        }
    }
}

/// Result type alias for PageDB operations
pub type Result<T> = std::result::Result<T, Error>;
