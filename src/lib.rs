//! Scan and write partitioned datasets of Parquet files.
//!
//! A dataset is a directory tree of files sharing a unified schema, with
//! hive-style `key=value` directories carrying partition values. Discovery
//! walks the tree into a [`Dataset`], scans stream record batches with
//! partition-aware pruning, and [`write_dataset`] fans a batch stream out
//! into one file per partition directory.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use terrace::{
//!     DatasetFactory, FileSelector, LocalFileSystem, ParquetFormat, PartitionExpr,
//!     PartitioningSpec, Scalar,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fs: Arc<dyn terrace::FileSystem> = Arc::new(LocalFileSystem);
//! let format = Arc::new(ParquetFormat::default());
//!
//! let dataset = DatasetFactory::new(fs.clone(), format)
//!     .with_partitioning(PartitioningSpec::InferHive)
//!     .discover(&FileSelector::new("/data/events"))
//!     .await?;
//!
//! let table = dataset
//!     .new_scan()
//!     .with_filter(PartitionExpr::eq("year", Scalar::Int64(2024)))
//!     .finish()?
//!     .to_table()
//!     .await?;
//! println!("{} rows", table.num_rows());
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod discovery;
pub mod error;
pub mod expr;
pub mod format;
pub mod fragment;
pub mod fs;
pub mod partition;
pub mod scalar;
pub mod scan;
pub mod table;
pub mod write;

pub use dataset::Dataset;
pub use discovery::{DatasetFactory, PartitioningSpec};
pub use error::{DiscoveryError, FormatError, PartitionError, ScanError, WriteError};
pub use expr::{Bindings, CmpOp, PartitionExpr, TriState};
pub use format::{BatchSink, BatchStream, FileFormat, parquet::ParquetFormat};
pub use fragment::Fragment;
pub use fs::{FileEntry, FileSelector, FileSystem, InputFile, LocalFileSystem, OutputFile};
pub use partition::{HivePartitioning, KeyPolicy, Partitioning};
pub use scalar::Scalar;
pub use scan::{ScanBuilder, ScanStream, Scanner};
pub use table::Table;
pub use write::{ExistingDataBehavior, WriteOptions, WriteSummary, write_dataset};
