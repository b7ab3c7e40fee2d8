use std::{fmt, sync::Arc};

use arrow::array::RecordBatch;
use arrow_schema::SchemaRef;
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use parquet::{
    arrow::{AsyncArrowWriter, ProjectionMask, async_reader::ParquetRecordBatchStreamBuilder},
    basic::Compression,
    file::properties::{EnabledStatistics, WriterProperties},
};

use super::{BatchSink, BatchStream, FileFormat};
use crate::{
    error::FormatError,
    fs::{FileSystem, OutputFile},
};

/// Parquet [`FileFormat`] backed by the async arrow reader/writer.
#[derive(Clone)]
pub struct ParquetFormat {
    properties: WriterProperties,
}

impl ParquetFormat {
    pub fn new() -> Self {
        Self {
            properties: default_writer_properties(),
        }
    }

    /// Override the writer properties used by [`FileFormat::open_writer`].
    pub fn with_writer_properties(mut self, properties: WriterProperties) -> Self {
        self.properties = properties;
        self
    }
}

impl Default for ParquetFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParquetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParquetFormat").finish_non_exhaustive()
    }
}

/// Dictionary encoding, page statistics, and Snappy compression.
fn default_writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(Compression::SNAPPY)
        .set_created_by(concat!("terrace version ", env!("CARGO_PKG_VERSION")).to_owned())
        .build()
}

#[async_trait]
impl FileFormat for ParquetFormat {
    fn extension(&self) -> &str {
        "parquet"
    }

    async fn inspect(
        &self,
        fs: &Arc<dyn FileSystem>,
        path: &str,
    ) -> Result<SchemaRef, FormatError> {
        let reader = fs.open_input(path).await?;
        let builder = ParquetRecordBatchStreamBuilder::new(reader)
            .await
            .map_err(|source| FormatError::CorruptFooter {
                path: path.to_string(),
                source,
            })?;
        Ok(builder.schema().clone())
    }

    async fn open_reader(
        &self,
        fs: &Arc<dyn FileSystem>,
        path: &str,
        projection: Option<&[usize]>,
    ) -> Result<BatchStream, FormatError> {
        let reader = fs.open_input(path).await?;
        let mut builder = ParquetRecordBatchStreamBuilder::new(reader)
            .await
            .map_err(|source| FormatError::CorruptFooter {
                path: path.to_string(),
                source,
            })?;

        if let Some(indices) = projection {
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices.iter().copied());
            builder = builder.with_projection(mask);
        }

        let stream = builder.build()?;
        Ok(stream.map_err(FormatError::from).boxed())
    }

    async fn open_writer(
        &self,
        fs: &Arc<dyn FileSystem>,
        path: &str,
        schema: SchemaRef,
    ) -> Result<Box<dyn BatchSink>, FormatError> {
        let file = fs.open_output(path).await?;
        let writer = AsyncArrowWriter::try_new(file, schema, Some(self.properties.clone()))?;
        Ok(Box::new(ParquetSink {
            writer,
            fs: fs.clone(),
            path: path.to_string(),
            finished: false,
        }))
    }
}

/// Removes its output file on drop unless `finish` completed, so a
/// cancelled write never leaves a footerless file behind.
struct ParquetSink {
    writer: AsyncArrowWriter<Box<dyn OutputFile>>,
    fs: Arc<dyn FileSystem>,
    path: String,
    finished: bool,
}

#[async_trait]
impl BatchSink for ParquetSink {
    async fn write(&mut self, batch: &RecordBatch) -> Result<(), FormatError> {
        Ok(self.writer.write(batch).await?)
    }

    async fn finish(mut self: Box<Self>) -> Result<(), FormatError> {
        self.writer.finish().await?;
        self.finished = true;
        Ok(())
    }

    async fn abort(mut self: Box<Self>) -> Result<(), FormatError> {
        self.finished = true;
        let fs = self.fs.clone();
        let path = self.path.clone();
        // release the handle before unlinking; buffered pages are discarded
        drop(self);
        fs.remove_file(&path).await?;
        Ok(())
    }
}

impl Drop for ParquetSink {
    fn drop(&mut self) {
        // no async context remains when a cancelled sink is dropped
        if !self.finished {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
