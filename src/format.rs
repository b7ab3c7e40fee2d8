//! The file-format capability interface.
//!
//! A format supplies three operations: `inspect` (schema from metadata only),
//! `open_reader` (a finite, restartable batch stream), and `open_writer` (a
//! sink whose file is finalized by `finish` or discarded by `abort` on every
//! exit path). Nothing here assumes a specific encoding, only that files are
//! self-describing enough to inspect.

use std::{fmt, sync::Arc};

use arrow::array::RecordBatch;
use arrow_schema::SchemaRef;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::{error::FormatError, fs::FileSystem};

pub mod parquet;

/// A finite, lazy sequence of record batches from one file.
pub type BatchStream = BoxStream<'static, Result<RecordBatch, FormatError>>;

#[async_trait]
pub trait FileFormat: Send + Sync + fmt::Debug + 'static {
    /// File extension (without dot) this format claims during discovery.
    fn extension(&self) -> &str;

    /// Read only the file's metadata/footer and return its schema.
    async fn inspect(
        &self,
        fs: &Arc<dyn FileSystem>,
        path: &str,
    ) -> Result<SchemaRef, FormatError>;

    /// Open a batch stream over the file. `projection` holds root column
    /// indices into the file schema; `None` reads every column. Each call
    /// reopens the source, so the sequence is restartable.
    async fn open_reader(
        &self,
        fs: &Arc<dyn FileSystem>,
        path: &str,
        projection: Option<&[usize]>,
    ) -> Result<BatchStream, FormatError>;

    /// Open a sink writing batches of `schema` to `path`.
    async fn open_writer(
        &self,
        fs: &Arc<dyn FileSystem>,
        path: &str,
        schema: SchemaRef,
    ) -> Result<Box<dyn BatchSink>, FormatError>;
}

/// Accepts batches for one output file.
///
/// Every sink must end in exactly one of `finish` (flushes the footer, the
/// file becomes readable) or `abort` (removes the partial file). A sink
/// dropped before either call, e.g. when the future driving a write is
/// cancelled, must discard its partial output best-effort.
#[async_trait]
pub trait BatchSink: Send {
    async fn write(&mut self, batch: &RecordBatch) -> Result<(), FormatError>;

    /// Finalize the file, flushing any footer. The file is valid afterwards.
    async fn finish(self: Box<Self>) -> Result<(), FormatError>;

    /// Drop the underlying handle without finalizing and remove the partial
    /// file.
    async fn abort(self: Box<Self>) -> Result<(), FormatError>;
}
