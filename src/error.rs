use arrow_schema::{ArrowError, DataType};
use parquet::errors::ParquetError;
use thiserror::Error;

/// Errors raised while converting between path segments and partition
/// expressions.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// A partition value could not be cast to the declared field type.
    #[error("cannot cast value '{value}' for partition field '{field}' to {target:?}")]
    TypeMismatch {
        /// Name of the partition field
        field: String,
        /// The offending value, as text
        value: String,
        /// Declared type of the partition field
        target: DataType,
    },

    /// A path segment referenced a key that is not a declared partition field.
    #[error("unknown partition key '{key}'")]
    UnknownKey { key: String },

    /// A path segment was not in `key=value` form.
    #[error("path segment '{segment}' is not a key=value pair")]
    InvalidSegment { segment: String },

    /// A row's partition column held a null value.
    #[error("partition field '{field}' is null")]
    NullKey { field: String },

    /// A declared partition field is missing from the row batch being written.
    #[error("partition field '{field}' not present in the batch schema")]
    MissingColumn { field: String },
}

/// Errors raised by a concrete [`FileFormat`](crate::format::FileFormat)
/// implementation.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The file footer/metadata could not be decoded.
    #[error("corrupt footer in '{path}': {source}")]
    CorruptFooter {
        path: String,
        #[source]
        source: ParquetError,
    },

    /// The file uses an encoding this build cannot decode. Reserved for
    /// [`FileFormat`](crate::format::FileFormat) implementations with
    /// feature-gated codec support; the bundled Parquet format surfaces
    /// decode failures as [`Parquet`](FormatError::Parquet) instead.
    #[error("unsupported encoding in '{path}': {detail}")]
    UnsupportedEncoding { path: String, detail: String },

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while discovering a dataset on a filesystem.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Two files declare the same field name with different types.
    #[error("schema conflict on field '{field}': {left:?} vs {right:?}")]
    SchemaConflict {
        field: String,
        left: DataType,
        right: DataType,
    },

    /// The selector's base directory could not be listed.
    #[error("cannot list '{path}': {source}")]
    PathUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Errors raised while scanning a dataset.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Reading one fragment failed. A materializing scan fails fast on this.
    #[error("fragment '{path}' read failed: {source}")]
    FragmentReadFailed {
        path: String,
        #[source]
        source: FormatError,
    },

    /// A projected column does not exist in the dataset schema.
    #[error("column '{column}' not found in dataset schema")]
    ColumnNotFound { column: String },

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Errors raised while writing a partitioned dataset.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The target directory already holds data and the existing-data policy
    /// is [`Error`](crate::write::ExistingDataBehavior::Error).
    #[error("target directory '{path}' is not empty")]
    TargetExists { path: String },

    /// The basename template has no `{i}` placeholder.
    #[error("basename template '{template}' does not contain '{{i}}'")]
    InvalidTemplate { template: String },

    /// The write was aborted mid-stream; unfinished output files were
    /// removed, already-finalized files were left intact.
    #[error("write aborted after partial output: {source}")]
    PartialWriteAborted {
        #[source]
        source: Box<WriteError>,
    },

    #[error("io error: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}
