use arrow::{array::RecordBatch, compute::concat_batches};
use arrow_schema::{ArrowError, SchemaRef};
use futures_util::{StreamExt, stream};

use crate::scan::ScanStream;

/// A fully materialized scan result: an ordered sequence of batches sharing
/// one schema.
#[derive(Clone, Debug)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Concatenate into a single batch.
    pub fn to_batch(&self) -> Result<RecordBatch, ArrowError> {
        concat_batches(&self.schema, &self.batches)
    }

    /// Turn the table back into a batch stream, e.g. to feed
    /// [`write_dataset`](crate::write::write_dataset).
    pub fn into_stream(self) -> ScanStream {
        stream::iter(self.batches.into_iter().map(Ok)).boxed()
    }
}
