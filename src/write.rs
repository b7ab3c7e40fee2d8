//! Writing a batch stream out as a partitioned dataset.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::ErrorKind,
    sync::Arc,
};

use arrow::{
    array::{RecordBatch, UInt32Array},
    compute::take,
};
use futures_util::TryStreamExt;
use tracing::{info, warn};

use crate::{
    error::WriteError,
    format::{BatchSink, FileFormat},
    fs::{FileSelector, FileSystem, join_path},
    partition::Partitioning,
    scan::ScanStream,
};

/// What to do when the target directory already holds data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExistingDataBehavior {
    /// Refuse to write if any file exists under the base dir.
    #[default]
    Error,
    /// Write new files next to whatever is already there, overwriting on
    /// name collision.
    OverwriteOrIgnore,
    /// Delete each partition directory the incoming data touches before
    /// writing into it. Untouched partitions are left alone.
    DeleteMatchingPartitions,
}

/// Configuration for [`write_dataset`].
#[derive(Debug)]
pub struct WriteOptions {
    base_dir: String,
    partitioning: Option<Arc<dyn Partitioning>>,
    format: Arc<dyn FileFormat>,
    basename_template: String,
    existing_data_behavior: ExistingDataBehavior,
    max_rows_per_file: Option<usize>,
}

impl WriteOptions {
    pub fn new(base_dir: impl Into<String>, format: Arc<dyn FileFormat>) -> Self {
        let basename_template = format!("part{{i}}.{}", format.extension());
        Self {
            base_dir: base_dir.into(),
            partitioning: None,
            format,
            basename_template,
            existing_data_behavior: ExistingDataBehavior::default(),
            max_rows_per_file: None,
        }
    }

    /// Partition output rows into `key=value` directories.
    pub fn with_partitioning(mut self, partitioning: Arc<dyn Partitioning>) -> Self {
        self.partitioning = Some(partitioning);
        self
    }

    /// File name template; must contain the `{i}` placeholder.
    pub fn with_basename_template(mut self, template: impl Into<String>) -> Self {
        self.basename_template = template.into();
        self
    }

    pub fn with_existing_data_behavior(mut self, behavior: ExistingDataBehavior) -> Self {
        self.existing_data_behavior = behavior;
        self
    }

    /// Roll to the next `{i}` shard once a partition's open file holds this
    /// many rows. Rolling happens at batch boundaries, so one oversized
    /// batch still lands in a single file. Default: never roll.
    pub fn with_max_rows_per_file(mut self, rows: usize) -> Self {
        self.max_rows_per_file = Some(rows.max(1));
        self
    }
}

/// What a completed write produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub files_written: usize,
    pub rows_written: usize,
}

/// Consume `source` and write its rows under `options.base_dir`, sharded
/// per touched partition directory.
///
/// On any failure after the first byte is written, every unfinished file
/// this call created is removed before the error is returned, wrapped in
/// [`WriteError::PartialWriteAborted`]. Pre-write validation failures
/// (bad template, occupied target) come back unwrapped and leave the
/// filesystem untouched. Dropping the returned future cancels the write;
/// the sinks of in-flight files discard their partial output on drop, so
/// only finalized files survive cancellation.
pub async fn write_dataset(
    fs: &Arc<dyn FileSystem>,
    options: &WriteOptions,
    source: ScanStream,
) -> Result<WriteSummary, WriteError> {
    if !options.basename_template.contains("{i}") {
        return Err(WriteError::InvalidTemplate {
            template: options.basename_template.clone(),
        });
    }

    if options.existing_data_behavior == ExistingDataBehavior::Error {
        let selector = FileSelector::new(&options.base_dir);
        match fs.list(&selector).await {
            Ok(entries) => {
                if let Some(entry) = entries.iter().find(|entry| !entry.is_dir) {
                    return Err(WriteError::TargetExists {
                        path: entry.path.clone(),
                    });
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }

    let mut writer = DatasetWriter {
        fs: fs.clone(),
        options,
        writers: BTreeMap::new(),
        shards: HashMap::new(),
        cleaned: HashSet::new(),
        summary: WriteSummary::default(),
    };

    match writer.run(source).await {
        Ok(()) => {
            let summary = writer.finish_all().await?;
            info!(
                files = summary.files_written,
                rows = summary.rows_written,
                base_dir = %options.base_dir,
                "dataset write complete"
            );
            Ok(summary)
        }
        Err(cause) => {
            writer.abort_all().await;
            Err(WriteError::PartialWriteAborted {
                source: Box::new(cause),
            })
        }
    }
}

struct OpenFile {
    sink: Box<dyn BatchSink>,
    path: String,
    rows: usize,
}

struct DatasetWriter<'a> {
    fs: Arc<dyn FileSystem>,
    options: &'a WriteOptions,
    // keyed by partition dir; BTreeMap so finalization order is stable
    writers: BTreeMap<String, OpenFile>,
    // next `{i}` index per partition dir, surviving shard rolls
    shards: HashMap<String, usize>,
    cleaned: HashSet<String>,
    summary: WriteSummary,
}

impl DatasetWriter<'_> {
    async fn run(&mut self, mut source: ScanStream) -> Result<(), WriteError> {
        while let Some(batch) = source.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }
            let groups = split_by_partition(&batch, self.options.partitioning.as_deref())?;
            for (segments, group) in groups {
                self.append(segments, &group).await?;
            }
        }
        Ok(())
    }

    async fn append(
        &mut self,
        segments: Vec<String>,
        batch: &RecordBatch,
    ) -> Result<(), WriteError> {
        let mut dir = self.options.base_dir.clone();
        for segment in &segments {
            dir = join_path(&dir, segment);
        }

        if let Some(max) = self.options.max_rows_per_file {
            let full = self
                .writers
                .get(&dir)
                .is_some_and(|open| open.rows > 0 && open.rows + batch.num_rows() > max);
            if full {
                if let Some(open) = self.writers.remove(&dir) {
                    self.close_one(open).await?;
                }
            }
        }

        if !self.writers.contains_key(&dir) {
            if self.options.existing_data_behavior
                == ExistingDataBehavior::DeleteMatchingPartitions
                && !segments.is_empty()
                && self.cleaned.insert(dir.clone())
            {
                match self.fs.remove_dir_all(&dir).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
            self.fs.create_dir_all(&dir).await?;
            let shard = self.shards.entry(dir.clone()).or_insert(0);
            let basename = self
                .options
                .basename_template
                .replace("{i}", &shard.to_string());
            *shard += 1;
            let path = join_path(&dir, &basename);
            let sink = self
                .options
                .format
                .open_writer(&self.fs, &path, batch.schema())
                .await?;
            self.writers.insert(
                dir.clone(),
                OpenFile {
                    sink,
                    path,
                    rows: 0,
                },
            );
        }

        if let Some(entry) = self.writers.get_mut(&dir) {
            entry.sink.write(batch).await?;
            entry.rows += batch.num_rows();
        }
        Ok(())
    }

    /// Finalize one open file and fold it into the running summary. The
    /// sink removes its own partial file if the footer never lands.
    async fn close_one(&mut self, open: OpenFile) -> Result<(), WriteError> {
        open.sink.finish().await?;
        self.summary.files_written += 1;
        self.summary.rows_written += open.rows;
        Ok(())
    }

    async fn finish_all(&mut self) -> Result<WriteSummary, WriteError> {
        while let Some((_, open)) = self.writers.pop_first() {
            if let Err(err) = self.close_one(open).await {
                self.abort_all().await;
                return Err(WriteError::PartialWriteAborted {
                    source: Box::new(err),
                });
            }
        }
        Ok(self.summary.clone())
    }

    async fn abort_all(&mut self) {
        while let Some((_, open)) = self.writers.pop_first() {
            if let Err(err) = open.sink.abort().await {
                warn!(path = %open.path, error = %err, "failed to clean up aborted file");
            }
        }
    }
}

/// Split a batch into per-partition sub-batches keyed by directory
/// segments, in order of first appearance.
fn split_by_partition(
    batch: &RecordBatch,
    partitioning: Option<&dyn Partitioning>,
) -> Result<Vec<(Vec<String>, RecordBatch)>, WriteError> {
    let Some(partitioning) = partitioning else {
        return Ok(vec![(Vec::new(), batch.clone())]);
    };
    if partitioning.fields().is_empty() || batch.num_rows() == 0 {
        return Ok(vec![(Vec::new(), batch.clone())]);
    }

    let mut order: Vec<Vec<String>> = Vec::new();
    let mut rows_of: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let segments = partitioning.format(batch, row)?;
        if !rows_of.contains_key(&segments) {
            order.push(segments.clone());
        }
        rows_of.entry(segments).or_default().push(row as u32);
    }

    let mut groups = Vec::with_capacity(order.len());
    for segments in order {
        let rows = rows_of.remove(&segments).unwrap_or_default();
        let indices = UInt32Array::from(rows);
        let columns = batch
            .columns()
            .iter()
            .map(|column| take(column, &indices, None))
            .collect::<Result<Vec<_>, _>>()?;
        let group = RecordBatch::try_new(batch.schema(), columns)?;
        groups.push((segments, group));
    }
    Ok(groups)
}
