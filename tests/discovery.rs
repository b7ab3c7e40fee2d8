use std::{path::Path, sync::Arc};

use arrow::array::{Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::AsyncArrowWriter;
use terrace::{
    DatasetFactory, DiscoveryError, FileSelector, FileSystem, LocalFileSystem, ParquetFormat,
    PartitioningSpec,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn int_batch(name: &str, values: &[i64]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Int64, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values.to_vec()))]).unwrap()
}

fn string_batch(name: &str, values: &[&str]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Utf8, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values.to_vec()))]).unwrap()
}

async fn write_file(path: &Path, batch: &RecordBatch) {
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    let file = tokio::fs::File::create(path).await.unwrap();
    let mut writer = AsyncArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).await.unwrap();
    writer.close().await.unwrap();
}

fn factory() -> (Arc<dyn FileSystem>, Arc<ParquetFormat>) {
    (Arc::new(LocalFileSystem), Arc::new(ParquetFormat::default()))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn discovers_fragments_in_lexicographic_order() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("b.parquet"), &int_batch("x", &[3, 4])).await;
    write_file(&dir.path().join("a.parquet"), &int_batch("x", &[1, 2])).await;
    write_file(&dir.path().join("notes.txt"), &int_batch("x", &[9])).await;

    let (fs, format) = factory();
    let dataset = DatasetFactory::new(fs, format)
        .discover(&FileSelector::new(path_str(dir.path())))
        .await
        .unwrap();

    assert_eq!(dataset.fragments().len(), 2);
    assert!(dataset.fragments()[0].path().ends_with("a.parquet"));
    assert!(dataset.fragments()[1].path().ends_with("b.parquet"));
    assert_eq!(dataset.schema().fields().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_discovery_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["c.parquet", "a.parquet", "b.parquet"] {
        write_file(&dir.path().join(name), &int_batch("x", &[1])).await;
    }

    let (fs, format) = factory();
    let selector = FileSelector::new(path_str(dir.path()));
    let first = DatasetFactory::new(fs.clone(), format.clone())
        .discover(&selector)
        .await
        .unwrap();
    let second = DatasetFactory::new(fs, format)
        .discover(&selector)
        .await
        .unwrap();

    let paths = |d: &terrace::Dataset| {
        d.fragments().iter().map(|f| f.path().to_string()).collect::<Vec<_>>()
    };
    assert_eq!(paths(&first), paths(&second));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_directory_yields_empty_dataset() {
    let dir = tempfile::tempdir().unwrap();

    let (fs, format) = factory();
    let dataset = DatasetFactory::new(fs, format)
        .discover(&FileSelector::new(path_str(dir.path())))
        .await
        .unwrap();

    assert!(dataset.fragments().is_empty());
    let table = dataset.new_scan().finish().unwrap().to_table().await.unwrap();
    assert_eq!(table.num_rows(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn conflicting_column_types_fail_discovery() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.parquet"), &int_batch("x", &[1])).await;
    write_file(&dir.path().join("b.parquet"), &string_batch("x", &["one"])).await;

    let (fs, format) = factory();
    let result = DatasetFactory::new(fs, format)
        .discover(&FileSelector::new(path_str(dir.path())))
        .await;

    assert!(matches!(result, Err(DiscoveryError::SchemaConflict { field, .. }) if field == "x"));
}

#[tokio::test(flavor = "multi_thread")]
async fn hive_inference_appends_typed_partition_column() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("year=2023/p.parquet"), &int_batch("v", &[1])).await;
    write_file(&dir.path().join("year=2024/p.parquet"), &int_batch("v", &[2])).await;

    let (fs, format) = factory();
    let dataset = DatasetFactory::new(fs, format)
        .with_partitioning(PartitioningSpec::InferHive)
        .discover(&FileSelector::new(path_str(dir.path())))
        .await
        .unwrap();

    let partitioning = dataset.partitioning().unwrap();
    assert_eq!(partitioning.fields().len(), 1);
    assert_eq!(partitioning.fields()[0].name(), "year");
    assert_eq!(partitioning.fields()[0].data_type(), &DataType::Int64);

    // all values parse as integers, so the column comes back Int64
    let year = dataset.schema().field_with_name("year").unwrap();
    assert_eq!(year.data_type(), &DataType::Int64);
    assert!(year.is_nullable());

    assert_eq!(
        dataset.fragments()[0].partition_expression().to_string(),
        "year = Int64(2023)"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn mixed_partition_values_fall_back_to_utf8() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("tag=12/p.parquet"), &int_batch("v", &[1])).await;
    write_file(&dir.path().join("tag=beta/p.parquet"), &int_batch("v", &[2])).await;

    let (fs, format) = factory();
    let dataset = DatasetFactory::new(fs, format)
        .with_partitioning(PartitioningSpec::InferHive)
        .discover(&FileSelector::new(path_str(dir.path())))
        .await
        .unwrap();

    let tag = dataset.schema().field_with_name("tag").unwrap();
    assert_eq!(tag.data_type(), &DataType::Utf8);
}
