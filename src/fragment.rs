use std::sync::Arc;

use arrow::{
    array::{BooleanArray, RecordBatch, new_null_array},
    compute::filter_record_batch,
};
use arrow_schema::SchemaRef;
use futures_util::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::{
    error::ScanError,
    expr::{Bindings, PartitionExpr, TriState},
    format::FileFormat,
    fs::FileSystem,
    scan::ScanStream,
};

/// One physical file contributing rows to a dataset, plus the partition
/// expression derived from its location at discovery time.
#[derive(Clone, Debug)]
pub struct Fragment {
    path: String,
    format: Arc<dyn FileFormat>,
    partition_expr: PartitionExpr,
    file_schema: SchemaRef,
}

impl Fragment {
    pub(crate) fn new(
        path: String,
        format: Arc<dyn FileFormat>,
        partition_expr: PartitionExpr,
        file_schema: SchemaRef,
    ) -> Self {
        Self {
            path,
            format,
            partition_expr,
            file_schema,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The constraint implied by this fragment's location, cached at
    /// discovery time.
    pub fn partition_expression(&self) -> &PartitionExpr {
        &self.partition_expr
    }

    /// The physical schema of the backing file (not the dataset schema).
    pub fn file_schema(&self) -> &SchemaRef {
        &self.file_schema
    }

    /// Stream this fragment's rows conformed to `output_schema`.
    ///
    /// If `filter` contradicts the fragment's partition expression, the
    /// returned stream is empty and storage is never touched. Otherwise the
    /// file is read with only the physically-present projected columns;
    /// partition columns absent from the file are materialized from the
    /// fragment's bindings, columns absent from both are null-filled, and the
    /// residual row filter is applied last.
    pub async fn scan(
        &self,
        fs: &Arc<dyn FileSystem>,
        output_schema: SchemaRef,
        filter: Option<&PartitionExpr>,
    ) -> Result<ScanStream, ScanError> {
        let bindings = self.partition_expr.bindings();
        if let Some(filter) = filter {
            if filter.evaluate_bindings(&bindings) == TriState::False {
                debug!(path = %self.path, filter = %filter, "fragment pruned");
                return Ok(stream::empty().boxed());
            }
        }

        let mut projection: Vec<usize> = output_schema
            .fields()
            .iter()
            .filter_map(|field| self.file_schema.index_of(field.name()).ok())
            .collect();
        projection.sort_unstable();

        let reader = self
            .format
            .open_reader(fs, &self.path, Some(&projection))
            .await
            .map_err(|source| ScanError::FragmentReadFailed {
                path: self.path.clone(),
                source,
            })?;

        let path = self.path.clone();
        let filter = filter.cloned();
        let stream = reader
            .map(move |item| {
                let batch = item.map_err(|source| ScanError::FragmentReadFailed {
                    path: path.clone(),
                    source,
                })?;
                let batch = conform_batch(&batch, &output_schema, &bindings)?;
                apply_row_filter(batch, filter.as_ref())
            })
            .try_filter(|batch| futures_util::future::ready(batch.num_rows() > 0))
            .boxed();
        Ok(stream)
    }
}

/// Rebuild `batch` with exactly the columns of `output_schema`.
fn conform_batch(
    batch: &RecordBatch,
    output_schema: &SchemaRef,
    bindings: &Bindings,
) -> Result<RecordBatch, ScanError> {
    let rows = batch.num_rows();
    let schema = batch.schema();
    let mut columns = Vec::with_capacity(output_schema.fields().len());
    for field in output_schema.fields() {
        let column = match schema.index_of(field.name()) {
            Ok(idx) => batch.column(idx).clone(),
            Err(_) => match bindings.get(field.name().as_str()) {
                Some(scalar) => scalar
                    .cast_to(field.name(), field.data_type())?
                    .to_array(rows),
                None => new_null_array(field.data_type(), rows),
            },
        };
        columns.push(column);
    }
    Ok(RecordBatch::try_new(output_schema.clone(), columns)?)
}

fn apply_row_filter(
    batch: RecordBatch,
    filter: Option<&PartitionExpr>,
) -> Result<RecordBatch, ScanError> {
    let Some(filter) = filter else {
        return Ok(batch);
    };
    let tri = filter.evaluate_batch(&batch);
    if tri.iter().all(|t| *t != TriState::False) {
        return Ok(batch);
    }
    // Unknown keeps the row: only a definite False may drop data
    let mask: BooleanArray = tri.iter().map(|t| Some(*t != TriState::False)).collect();
    Ok(filter_record_batch(&batch, &mask)?)
}
