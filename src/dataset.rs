use std::{fmt, sync::Arc};

use arrow_schema::SchemaRef;

use crate::{
    format::FileFormat, fragment::Fragment, fs::FileSystem, partition::Partitioning,
    scan::ScanBuilder,
};

/// A discovered set of fragments with their unified schema and the
/// partitioning used to interpret their locations.
///
/// Fragment order is fixed at discovery time (lexicographic by path) and is
/// the order materializing scans observe.
pub struct Dataset {
    fs: Arc<dyn FileSystem>,
    format: Arc<dyn FileFormat>,
    schema: SchemaRef,
    fragments: Vec<Fragment>,
    partitioning: Option<Arc<dyn Partitioning>>,
}

impl Dataset {
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        format: Arc<dyn FileFormat>,
        schema: SchemaRef,
        fragments: Vec<Fragment>,
        partitioning: Option<Arc<dyn Partitioning>>,
    ) -> Self {
        Self {
            fs,
            format,
            schema,
            fragments,
            partitioning,
        }
    }

    /// The unified schema: the reconciliation of all fragment schemas plus
    /// any partition fields not stored in the files themselves.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn format(&self) -> &Arc<dyn FileFormat> {
        &self.format
    }

    pub fn partitioning(&self) -> Option<&Arc<dyn Partitioning>> {
        self.partitioning.as_ref()
    }

    pub(crate) fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Start configuring a scan over this dataset.
    pub fn new_scan(&self) -> ScanBuilder<'_> {
        ScanBuilder::new(self)
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("schema", &self.schema)
            .field("fragments", &self.fragments.len())
            .field("partitioning", &self.partitioning)
            .finish_non_exhaustive()
    }
}
