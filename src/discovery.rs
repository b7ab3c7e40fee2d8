//! Walking a filesystem selector into a [`Dataset`].

use std::{collections::HashMap, sync::Arc};

use arrow_schema::{Field, Schema, SchemaRef};
use futures_util::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::{
    dataset::Dataset,
    error::DiscoveryError,
    expr::PartitionExpr,
    format::FileFormat,
    fragment::Fragment,
    fs::{FileSelector, FileSystem, segments_below},
    partition::{HivePartitioning, Partitioning},
};

/// How discovery should interpret directory segments below the base dir.
#[derive(Clone, Debug, Default)]
pub enum PartitioningSpec {
    /// Directories carry no partition information.
    #[default]
    None,
    /// Use a declared hive partitioning.
    Hive(HivePartitioning),
    /// Infer hive partition keys and types from the observed paths.
    InferHive,
}

const DEFAULT_INSPECT_PARALLELISM: usize = 4;

/// Discovers the fragments of a dataset under a selector.
pub struct DatasetFactory {
    fs: Arc<dyn FileSystem>,
    format: Arc<dyn FileFormat>,
    partitioning: PartitioningSpec,
    inspect_parallelism: usize,
}

impl DatasetFactory {
    pub fn new(fs: Arc<dyn FileSystem>, format: Arc<dyn FileFormat>) -> Self {
        Self {
            fs,
            format,
            partitioning: PartitioningSpec::default(),
            inspect_parallelism: DEFAULT_INSPECT_PARALLELISM,
        }
    }

    pub fn with_partitioning(mut self, partitioning: PartitioningSpec) -> Self {
        self.partitioning = partitioning;
        self
    }

    /// How many file footers may be inspected concurrently (minimum 1).
    pub fn with_inspect_parallelism(mut self, parallelism: usize) -> Self {
        self.inspect_parallelism = parallelism.max(1);
        self
    }

    /// Enumerate matching files, derive each fragment's partition
    /// expression, and unify the per-file schemas.
    ///
    /// Fragments come back in lexicographic path order, so repeated
    /// discovery over an unchanged tree is reproducible. Zero matching
    /// files yields an empty dataset, not an error.
    pub async fn discover(&self, selector: &FileSelector) -> Result<Dataset, DiscoveryError> {
        let entries = self.fs.list(selector).await.map_err(|source| {
            DiscoveryError::PathUnreadable {
                path: selector.base_dir.clone(),
                source,
            }
        })?;

        let suffix = format!(".{}", self.format.extension());
        let mut paths: Vec<String> = entries
            .into_iter()
            .filter(|entry| !entry.is_dir && entry.path.ends_with(&suffix))
            .map(|entry| entry.path)
            .collect();
        paths.sort();

        // directory segments below the base dir, filename excluded
        let mut dir_segments: Vec<Vec<&str>> = Vec::with_capacity(paths.len());
        for path in &paths {
            let mut segments = segments_below(&selector.base_dir, path).unwrap_or_default();
            segments.pop();
            dir_segments.push(segments);
        }

        let partitioning: Option<Arc<dyn Partitioning>> = match &self.partitioning {
            PartitioningSpec::None => None,
            PartitioningSpec::Hive(hive) => Some(Arc::new(hive.clone())),
            PartitioningSpec::InferHive => Some(Arc::new(HivePartitioning::infer(&dir_segments))),
        };

        let mut exprs = Vec::with_capacity(paths.len());
        for segments in &dir_segments {
            let expr = match &partitioning {
                Some(p) => p.parse(segments)?,
                None => PartitionExpr::True,
            };
            exprs.push(expr);
        }

        // footer reads overlap, collection order stays deterministic
        let schemas: Vec<SchemaRef> = stream::iter(paths.clone().into_iter().map(|path| {
            let format = self.format.clone();
            let fs = self.fs.clone();
            async move { format.inspect(&fs, &path).await }
        }))
        .buffered(self.inspect_parallelism)
        .try_collect()
        .await?;

        let schema = unify_schemas(&schemas, partitioning.as_deref())?;

        let fragments: Vec<Fragment> = paths
            .into_iter()
            .zip(exprs)
            .zip(schemas)
            .map(|((path, expr), file_schema)| {
                debug!(path = %path, expr = %expr, "discovered fragment");
                Fragment::new(path, self.format.clone(), expr, file_schema)
            })
            .collect();

        Ok(Dataset::new(
            self.fs.clone(),
            self.format.clone(),
            schema,
            fragments,
            partitioning,
        ))
    }
}

/// Union of all file schemas in first-seen field order, with declared or
/// inferred partition fields appended when the files do not store them.
fn unify_schemas(
    schemas: &[SchemaRef],
    partitioning: Option<&dyn Partitioning>,
) -> Result<SchemaRef, DiscoveryError> {
    let mut fields: Vec<Field> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen: Vec<usize> = Vec::new();

    for schema in schemas {
        for field in schema.fields() {
            match index.get(field.name()) {
                Some(&i) => {
                    if fields[i].data_type() != field.data_type() {
                        return Err(DiscoveryError::SchemaConflict {
                            field: field.name().clone(),
                            left: fields[i].data_type().clone(),
                            right: field.data_type().clone(),
                        });
                    }
                    if field.is_nullable() && !fields[i].is_nullable() {
                        fields[i] = fields[i].clone().with_nullable(true);
                    }
                    seen[i] += 1;
                }
                None => {
                    index.insert(field.name().clone(), fields.len());
                    fields.push(field.as_ref().clone());
                    seen.push(1);
                }
            }
        }
    }

    // a field absent from some file gets null-filled there, so it must be
    // nullable in the unified schema
    for (i, count) in seen.iter().enumerate() {
        if *count < schemas.len() && !fields[i].is_nullable() {
            fields[i] = fields[i].clone().with_nullable(true);
        }
    }

    if let Some(partitioning) = partitioning {
        for field in partitioning.fields().iter() {
            if !index.contains_key(field.name()) {
                index.insert(field.name().clone(), fields.len());
                fields.push(field.as_ref().clone().with_nullable(true));
            }
        }
    }

    Ok(Arc::new(Schema::new(fields)))
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;

    use super::*;

    fn schema_of(fields: Vec<(&str, DataType, bool)>) -> SchemaRef {
        Arc::new(Schema::new(
            fields
                .into_iter()
                .map(|(name, data_type, nullable)| Field::new(name, data_type, nullable))
                .collect::<Vec<_>>(),
        ))
    }

    #[test]
    fn unify_keeps_first_seen_order() {
        let a = schema_of(vec![("a", DataType::Int64, false), ("b", DataType::Utf8, false)]);
        let b = schema_of(vec![("c", DataType::Int64, false), ("a", DataType::Int64, false)]);
        let unified = unify_schemas(&[a, b], None).unwrap();
        let names: Vec<&str> = unified.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        // b and c each miss one file, so they become nullable
        assert!(!unified.field(0).is_nullable());
        assert!(unified.field(1).is_nullable());
        assert!(unified.field(2).is_nullable());
    }

    #[test]
    fn unify_rejects_type_conflicts() {
        let a = schema_of(vec![("a", DataType::Int64, false)]);
        let b = schema_of(vec![("a", DataType::Utf8, false)]);
        assert!(matches!(
            unify_schemas(&[a, b], None),
            Err(DiscoveryError::SchemaConflict { .. })
        ));
    }

    #[test]
    fn unify_appends_partition_fields() {
        let a = schema_of(vec![("x", DataType::Int64, false)]);
        let partitioning = HivePartitioning::new(vec![Field::new("year", DataType::Int64, true)]);
        let unified = unify_schemas(&[a], Some(&partitioning)).unwrap();
        let names: Vec<&str> = unified.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["x", "year"]);
    }
}
