//! Turning a dataset's fragments into one batch sequence.
//!
//! Fragments are opened with bounded concurrency; batch delivery is ordered
//! by default so repeated scans of an unchanged dataset are reproducible.
//! Streaming consumers that do not need order can opt into unordered
//! delivery for throughput. All sequences are pull-based: dropping a stream
//! (or the future polling it) cancels the scan at the next I/O boundary.

use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow_schema::SchemaRef;
use futures_util::{StreamExt, TryStreamExt, stream, stream::BoxStream};

use crate::{
    dataset::Dataset,
    error::ScanError,
    expr::PartitionExpr,
    fragment::Fragment,
    fs::FileSystem,
    table::Table,
};

/// A lazy sequence of record batches produced by a scan.
pub type ScanStream = BoxStream<'static, Result<RecordBatch, ScanError>>;

const DEFAULT_FRAGMENT_PARALLELISM: usize = 4;

/// Configures a scan before it starts pulling data.
pub struct ScanBuilder<'a> {
    dataset: &'a Dataset,
    projection: Option<Vec<String>>,
    filter: Option<PartitionExpr>,
    fragment_parallelism: usize,
    unordered: bool,
}

impl<'a> ScanBuilder<'a> {
    pub(crate) fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            projection: None,
            filter: None,
            fragment_parallelism: DEFAULT_FRAGMENT_PARALLELISM,
            unordered: false,
        }
    }

    /// Only produce the named columns, in the given order.
    pub fn with_projection(mut self, columns: Vec<String>) -> Self {
        self.projection = Some(columns);
        self
    }

    /// Filter rows; fragments whose partition expression contradicts the
    /// filter are skipped without any I/O.
    pub fn with_filter(mut self, filter: PartitionExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// How many fragments may be opened concurrently (minimum 1).
    pub fn with_fragment_parallelism(mut self, parallelism: usize) -> Self {
        self.fragment_parallelism = parallelism.max(1);
        self
    }

    /// Allow batches of different fragments to interleave in
    /// [`Scanner::to_batches`]. Materializing with [`Scanner::to_table`]
    /// stays deterministic regardless.
    pub fn with_unordered(mut self, unordered: bool) -> Self {
        self.unordered = unordered;
        self
    }

    pub fn finish(self) -> Result<Scanner, ScanError> {
        let dataset_schema = self.dataset.schema();
        let output_schema = match &self.projection {
            None => dataset_schema.clone(),
            Some(columns) => {
                let mut indices = Vec::with_capacity(columns.len());
                for column in columns {
                    let idx = dataset_schema.index_of(column).map_err(|_| {
                        ScanError::ColumnNotFound {
                            column: column.clone(),
                        }
                    })?;
                    indices.push(idx);
                }
                Arc::new(dataset_schema.project(&indices)?)
            }
        };

        Ok(Scanner {
            fs: self.dataset.fs().clone(),
            fragments: self.dataset.fragments().to_vec(),
            output_schema,
            filter: self.filter,
            fragment_parallelism: self.fragment_parallelism,
            unordered: self.unordered,
        })
    }
}

/// An executable scan: fragments, output schema, and filter, detached from
/// the dataset that built it.
pub struct Scanner {
    fs: Arc<dyn FileSystem>,
    fragments: Vec<Fragment>,
    output_schema: SchemaRef,
    filter: Option<PartitionExpr>,
    fragment_parallelism: usize,
    unordered: bool,
}

impl Scanner {
    /// The schema every produced batch conforms to.
    pub fn schema(&self) -> &SchemaRef {
        &self.output_schema
    }

    /// Stream batches. Ordered mode concatenates fragment outputs in
    /// dataset order; unordered mode may interleave them.
    pub fn to_batches(self) -> ScanStream {
        let Scanner {
            fs,
            fragments,
            output_schema,
            filter,
            fragment_parallelism,
            unordered,
        } = self;

        let openers = stream::iter(fragments.into_iter().map(move |fragment| {
            let fs = fs.clone();
            let output_schema = output_schema.clone();
            let filter = filter.clone();
            async move { fragment.scan(&fs, output_schema, filter.as_ref()).await }
        }));

        if unordered {
            openers
                .buffer_unordered(fragment_parallelism)
                .try_flatten_unordered(None)
                .boxed()
        } else {
            openers
                .buffered(fragment_parallelism)
                .try_flatten()
                .boxed()
        }
    }

    /// Materialize everything into a [`Table`].
    ///
    /// Output equals the in-order concatenation of per-fragment scans
    /// regardless of how fragment reads overlap; a single fragment failure
    /// aborts the whole scan.
    pub async fn to_table(mut self) -> Result<Table, ScanError> {
        // the ordering guarantee for materialized output is unconditional
        self.unordered = false;
        let schema = self.output_schema.clone();
        let batches: Vec<RecordBatch> = self.to_batches().try_collect().await?;
        Ok(Table::new(schema, batches))
    }
}
