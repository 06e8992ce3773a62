use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Result type for the merge pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for key-value store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for uploads.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error type returned by file loading.
///
/// A single error enum shared across directory listing, CSV, and (optional) spreadsheet loading.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal failed.
    #[error("directory listing error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The file name pattern is not a valid glob.
    #[error("invalid file name pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[cfg(feature = "excel")]
    /// Spreadsheet loading error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV loading error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Nothing in the directory matched the pattern and the selected file kinds.
    #[error("no matching files in {} (pattern={pattern:?})", .dir.display())]
    NoMatchingFiles {
        dir: PathBuf,
        pattern: Option<String>,
    },

    /// The file extension does not map to a supported file kind.
    #[error("unsupported file format: {} (expected .csv or a spreadsheet such as .xlsx)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// A record has more fields than the header.
    #[error("malformed row {row} in {source_name}: expected at most {expected} fields, found {found}")]
    MalformedRow {
        source_name: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Spreadsheet support was compiled out.
    #[error("excel ingestion not enabled (enable cargo feature 'excel')")]
    ExcelDisabled,
}

/// What went wrong inside a transform.
#[derive(Debug, Error)]
pub enum TransformErrorKind {
    /// The transform refers to a column the table does not have.
    #[error("column '{column}' not found. columns={columns:?}")]
    MissingColumn { column: String, columns: Vec<String> },

    /// A textual transform spec could not be parsed.
    #[error("invalid spec: {message}")]
    InvalidSpec { message: String },
}

/// A named transform failed (or could not be parsed).
#[derive(Debug, Error)]
#[error("transform '{name}' failed: {kind}")]
pub struct TransformError {
    /// Transform name (its textual spec).
    pub name: String,
    /// Failure detail.
    #[source]
    pub kind: TransformErrorKind,
}

/// Error returned by the table writer.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "excel")]
    /// Workbook serialization error.
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// The table does not fit in a worksheet.
    #[error("table too large for a worksheet: {message}")]
    TooLarge { message: String },
}

/// Error returned by the merge pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading the input directory failed.
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// A transform failed; the whole merge is aborted.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Writing the output failed.
    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

/// Error returned by a [`crate::store::KeyValueStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request could not be completed (connectivity, auth, throttling, ...).
    #[error("store request '{operation}' failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    /// The store refused to create the table.
    #[error("store rejected creation of table '{table}': {message}")]
    CreateRejected { table: String, message: String },

    /// The table does not exist.
    #[error("table '{table}' not found")]
    TableNotFound { table: String },

    /// A value could not be represented in the store.
    #[error("invalid value for attribute '{attribute}': {message}")]
    InvalidValue { attribute: String, message: String },
}

/// Error returned by the uploader.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Reading the input file failed.
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// The key column is not part of the loaded table.
    #[error("primary key column '{column}' not found in file. columns={columns:?}")]
    MissingKeyColumn { column: String, columns: Vec<String> },

    /// A pre-upload transform failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error returned while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be read or did not match the expected shape.
    #[error("config error: {0}")]
    Figment(#[from] figment::Error),

    /// A required secret was not present in the environment.
    #[error("missing required environment variable {name}")]
    MissingSecret { name: &'static str },
}
