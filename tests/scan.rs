use std::{path::Path, sync::Arc};

use arrow::array::{Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use futures_util::TryStreamExt;
use parquet::arrow::AsyncArrowWriter;
use terrace::{
    CmpOp, DatasetFactory, FileSelector, FileSystem, LocalFileSystem, ParquetFormat,
    PartitionExpr, Scalar, ScanError, Table,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn make_batch(ids: &[i64], names: &[&str]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(ids.to_vec())),
            Arc::new(StringArray::from(names.to_vec())),
        ],
    )
    .unwrap()
}

async fn write_file(path: &Path, batch: &RecordBatch) {
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    let file = tokio::fs::File::create(path).await.unwrap();
    let mut writer = AsyncArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).await.unwrap();
    writer.close().await.unwrap();
}

async fn two_file_dataset(dir: &Path) -> terrace::Dataset {
    write_file(
        &dir.join("a.parquet"),
        &make_batch(&[1, 2, 3], &["ant", "bee", "cat"]),
    )
    .await;
    write_file(
        &dir.join("b.parquet"),
        &make_batch(&[4, 5], &["dog", "eel"]),
    )
    .await;

    let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem);
    DatasetFactory::new(fs, Arc::new(ParquetFormat::default()))
        .discover(&FileSelector::new(path_str(dir)))
        .await
        .unwrap()
}

fn collect_rows(table: &Table) -> Vec<(i64, String)> {
    let mut rows = Vec::new();
    for batch in table.batches() {
        let ids = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        let names = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        for i in 0..batch.num_rows() {
            rows.push((ids.value(i), names.value(i).to_string()));
        }
    }
    rows
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn to_table_reads_fragments_in_dataset_order() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = two_file_dataset(dir.path()).await;

    let table = dataset.new_scan().finish().unwrap().to_table().await.unwrap();
    assert_eq!(table.num_rows(), 5);
    assert_eq!(
        collect_rows(&table),
        vec![
            (1, "ant".to_string()),
            (2, "bee".to_string()),
            (3, "cat".to_string()),
            (4, "dog".to_string()),
            (5, "eel".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn projection_reorders_and_drops_columns() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = two_file_dataset(dir.path()).await;

    let table = dataset
        .new_scan()
        .with_projection(vec!["name".to_string()])
        .finish()
        .unwrap()
        .to_table()
        .await
        .unwrap();

    assert_eq!(table.schema().fields().len(), 1);
    assert_eq!(table.schema().field(0).name(), "name");
    assert_eq!(table.num_rows(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_projection_column_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = two_file_dataset(dir.path()).await;

    let result = dataset
        .new_scan()
        .with_projection(vec!["missing".to_string()])
        .finish();
    assert!(matches!(result, Err(ScanError::ColumnNotFound { column }) if column == "missing"));
}

#[tokio::test(flavor = "multi_thread")]
async fn row_filter_drops_non_matching_rows() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = two_file_dataset(dir.path()).await;

    let table = dataset
        .new_scan()
        .with_filter(PartitionExpr::cmp("id", CmpOp::Gt, Scalar::Int64(2)))
        .finish()
        .unwrap()
        .to_table()
        .await
        .unwrap();

    let ids: Vec<i64> = collect_rows(&table).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![3, 4, 5]);
}

#[tokio::test(flavor = "multi_thread")]
async fn streaming_matches_materialized_rows() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = two_file_dataset(dir.path()).await;

    let table = dataset.new_scan().finish().unwrap().to_table().await.unwrap();

    let batches: Vec<RecordBatch> = dataset
        .new_scan()
        .with_unordered(true)
        .finish()
        .unwrap()
        .to_batches()
        .try_collect()
        .await
        .unwrap();
    let streamed = Table::new(table.schema().clone(), batches);

    // unordered delivery may interleave, the row multiset is unchanged
    let mut expected = collect_rows(&table);
    let mut actual = collect_rows(&streamed);
    expected.sort();
    actual.sort();
    assert_eq!(expected, actual);
}
