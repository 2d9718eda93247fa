use thiserror::Error;

use crate::types::{PageNumber, RowKey};

/// Broad category of a [`DatabaseError`], for callers that react per class
/// rather than per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Integrity,
    Structural,
    Format,
    Io,
    Unsupported,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid database header: {reason}")]
    InvalidHeader { reason: String },

    #[error("Unsupported file format: read version {read}, write version {write}")]
    UnsupportedFileFormat { read: u8, write: u8 },

    #[error("File '{path}' is read-only (write version {version})")]
    ReadOnly { path: String, version: u8 },

    #[error("Invalid page type: {0}")]
    InvalidPageType(u8),

    #[error("Serialization/deserialization error: {details}")]
    SerializationError { details: String },

    #[error("Access of {len} bytes at offset {offset} is outside page {page_number}")]
    OutOfBounds {
        page_number: PageNumber,
        offset: usize,
        len: usize,
    },

    #[error("Corrupted page: page_number={page_number}, reason={reason}")]
    CorruptedPage {
        page_number: PageNumber,
        reason: String,
    },

    #[error("Page is full (page_number: {page_number})")]
    PageFull { page_number: PageNumber },

    #[error("Record of {size} bytes exceeds the per-page limit of {max} bytes")]
    RecordTooLarge { size: usize, max: usize },

    #[error("Page {child} is not referenced by parent page {parent}")]
    PointerNotFound {
        parent: PageNumber,
        child: PageNumber,
    },

    #[error("Table '{name}' contains no data")]
    EmptyTable { name: String },

    #[error("Missing required data for column '{column}' (NOT NULL)")]
    MissingValue { column: String },

    #[error("Column '{column}' cannot be NULL")]
    NotNull { column: String },

    #[error("Value for column '{column}' is longer than the declared length {max}")]
    ValueTooLong { column: String, max: usize },

    #[error("Value {value} is out of range for column '{column}' of type {column_type}")]
    OutOfRange {
        column: String,
        value: String,
        column_type: String,
    },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Invalid schema: {details}")]
    InvalidSchema { details: String },

    #[error("Duplicate row key {key}")]
    DuplicateKey { key: RowKey },

    #[error("Table '{table}' declares more than one primary key column")]
    MultiplePrimaryKeys { table: String },

    #[error("Table '{name}' not found")]
    TableNotFound { name: String },

    #[error("Table '{name}' already exists")]
    TableAlreadyExists { name: String },

    #[error("Column '{name}' not found in table '{table}'")]
    ColumnNotFound { name: String, table: String },

    #[error("Column index {index} out of bounds")]
    ColumnIndexOutOfBounds { index: usize },

    #[error("Unsupported comparison operation '{0}'")]
    UnsupportedOperator(String),
}

impl DatabaseError {
    pub fn kind(&self) -> ErrorKind {
        use DatabaseError::*;
        match self {
            Io(_) => ErrorKind::Io,
            InvalidHeader { .. }
            | UnsupportedFileFormat { .. }
            | ReadOnly { .. }
            | InvalidPageType(_)
            | SerializationError { .. } => ErrorKind::Format,
            MissingValue { .. }
            | NotNull { .. }
            | ValueTooLong { .. }
            | OutOfRange { .. }
            | TypeMismatch { .. }
            | InvalidSchema { .. } => ErrorKind::Schema,
            DuplicateKey { .. } | MultiplePrimaryKeys { .. } => ErrorKind::Integrity,
            UnsupportedOperator(_) => ErrorKind::Unsupported,
            OutOfBounds { .. }
            | CorruptedPage { .. }
            | PageFull { .. }
            | RecordTooLarge { .. }
            | PointerNotFound { .. }
            | EmptyTable { .. }
            | TableNotFound { .. }
            | TableAlreadyExists { .. }
            | ColumnNotFound { .. }
            | ColumnIndexOutOfBounds { .. } => ErrorKind::Structural,
        }
    }

    pub(crate) fn corrupted(page_number: PageNumber, reason: impl Into<String>) -> Self {
        DatabaseError::CorruptedPage {
            page_number,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
