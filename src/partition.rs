//! Mapping between directory path segments and partition expressions.

use std::fmt;

use arrow::array::RecordBatch;
use arrow_schema::{DataType, Field, Fields};
use tracing::warn;

use crate::{
    error::PartitionError,
    expr::PartitionExpr,
    scalar::Scalar,
};

/// How to treat path segments that do not correspond to a declared partition
/// field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum KeyPolicy {
    /// Skip unknown keys and malformed segments (logged at `warn`).
    #[default]
    Lenient,
    /// Reject unknown keys and malformed segments.
    Strict,
}

/// Converts between a sequence of path segments and a [`PartitionExpr`], and
/// back again when writing.
///
/// `format` is a left-inverse of `parse`: parsing the segments formatted from
/// a row yields an expression that evaluates true on that row.
pub trait Partitioning: Send + Sync + fmt::Debug {
    /// The declared partition fields, in path order.
    fn fields(&self) -> &Fields;

    /// Directory segments below the dataset base dir -> constraint expression.
    fn parse(&self, segments: &[&str]) -> Result<PartitionExpr, PartitionError>;

    /// The path segments encoding `row` of `batch`, in field order.
    fn format(&self, batch: &RecordBatch, row: usize) -> Result<Vec<String>, PartitionError>;
}

/// Hive-style `key=value` directory partitioning.
#[derive(Clone, Debug)]
pub struct HivePartitioning {
    fields: Fields,
    key_policy: KeyPolicy,
}

impl HivePartitioning {
    pub fn new(fields: impl Into<Fields>) -> Self {
        Self {
            fields: fields.into(),
            key_policy: KeyPolicy::default(),
        }
    }

    pub fn with_key_policy(mut self, key_policy: KeyPolicy) -> Self {
        self.key_policy = key_policy;
        self
    }

    /// Infer a partitioning from the directory segments of discovered files.
    ///
    /// Keys appear in first-seen order. A key whose observed values all parse
    /// as `i64` is typed `Int64`, otherwise `Utf8`. Segments that are not
    /// `key=value` pairs carry no partition information and are skipped.
    pub fn infer(segment_lists: &[Vec<&str>]) -> Self {
        let mut keys: Vec<String> = Vec::new();
        let mut all_int: Vec<bool> = Vec::new();

        for segments in segment_lists {
            for segment in segments {
                let Some((key, value)) = segment.split_once('=') else {
                    continue;
                };
                let idx = match keys.iter().position(|k| k == key) {
                    Some(idx) => idx,
                    None => {
                        keys.push(key.to_string());
                        all_int.push(true);
                        keys.len() - 1
                    }
                };
                if value.parse::<i64>().is_err() {
                    all_int[idx] = false;
                }
            }
        }

        let fields: Vec<Field> = keys
            .into_iter()
            .zip(all_int)
            .map(|(key, int)| {
                let data_type = if int { DataType::Int64 } else { DataType::Utf8 };
                Field::new(key, data_type, true)
            })
            .collect();
        Self::new(fields)
    }

    fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == key).map(|f| f.as_ref())
    }
}

impl Partitioning for HivePartitioning {
    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn parse(&self, segments: &[&str]) -> Result<PartitionExpr, PartitionError> {
        let mut parts = Vec::new();
        for segment in segments {
            let Some((key, value)) = segment.split_once('=') else {
                match self.key_policy {
                    KeyPolicy::Strict => {
                        return Err(PartitionError::InvalidSegment {
                            segment: segment.to_string(),
                        });
                    }
                    KeyPolicy::Lenient => {
                        warn!("skipping non key=value path segment '{segment}'");
                        continue;
                    }
                }
            };
            let Some(field) = self.field(key) else {
                match self.key_policy {
                    KeyPolicy::Strict => {
                        return Err(PartitionError::UnknownKey {
                            key: key.to_string(),
                        });
                    }
                    KeyPolicy::Lenient => {
                        warn!("skipping unknown partition key '{key}'");
                        continue;
                    }
                }
            };
            let scalar = Scalar::parse_str(key, value, field.data_type())?;
            parts.push(PartitionExpr::eq(key, scalar));
        }
        Ok(PartitionExpr::and(parts))
    }

    fn format(&self, batch: &RecordBatch, row: usize) -> Result<Vec<String>, PartitionError> {
        let schema = batch.schema();
        let mut segments = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            let name = field.name();
            let idx = schema
                .index_of(name)
                .map_err(|_| PartitionError::MissingColumn {
                    field: name.clone(),
                })?;
            let value = Scalar::from_array(name, batch.column(idx), row)?
                .ok_or_else(|| PartitionError::NullKey {
                    field: name.clone(),
                })?;
            let value = value.cast_to(name, field.data_type())?;
            segments.push(format!("{}={}", name, value.to_segment_text()));
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow_schema::{DataType, Field};

    use super::*;
    use crate::expr::TriState;

    fn sample_batch() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            ("a", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            (
                "region",
                Arc::new(StringArray::from(vec!["eu", "us"])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    fn hive(fields: Vec<Field>) -> HivePartitioning {
        HivePartitioning::new(fields)
    }

    #[test]
    fn parse_builds_equality_conjunction() {
        let partitioning = hive(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("region", DataType::Utf8, true),
        ]);
        let expr = partitioning.parse(&["a=2", "region=eu"]).unwrap();
        assert_eq!(expr.to_string(), "(a = Int64(2) AND region = Utf8(\"eu\"))");
    }

    #[test]
    fn parse_type_mismatch() {
        let partitioning = hive(vec![Field::new("a", DataType::Int64, true)]);
        assert!(matches!(
            partitioning.parse(&["a=banana"]),
            Err(PartitionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unknown_key_policy() {
        let lenient = hive(vec![Field::new("a", DataType::Int64, true)]);
        let expr = lenient.parse(&["a=1", "other=zzz"]).unwrap();
        assert_eq!(expr.to_string(), "a = Int64(1)");

        let strict = lenient.clone().with_key_policy(KeyPolicy::Strict);
        assert!(matches!(
            strict.parse(&["a=1", "other=zzz"]),
            Err(PartitionError::UnknownKey { .. })
        ));
        assert!(matches!(
            strict.parse(&["plainsegment"]),
            Err(PartitionError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn empty_field_set_is_trivial() {
        let partitioning = hive(vec![]);
        assert_eq!(partitioning.parse(&[]).unwrap(), PartitionExpr::True);
        assert_eq!(partitioning.format(&sample_batch(), 0).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn format_rejects_null_partition_values() {
        let schema = arrow_schema::Schema::new(vec![Field::new("a", DataType::Int64, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int64Array::from(vec![Some(1), None])) as ArrayRef],
        )
        .unwrap();

        let partitioning = hive(vec![Field::new("a", DataType::Int64, true)]);
        assert_eq!(partitioning.format(&batch, 0).unwrap(), vec!["a=1".to_string()]);
        assert!(matches!(
            partitioning.format(&batch, 1),
            Err(PartitionError::NullKey { field }) if field == "a"
        ));
    }

    #[test]
    fn format_casts_to_declared_type() {
        // column is Int64, partition field declared Utf8: implicit cast
        let partitioning = hive(vec![Field::new("a", DataType::Utf8, true)]);
        let segments = partitioning.format(&sample_batch(), 1).unwrap();
        assert_eq!(segments, vec!["a=2".to_string()]);
    }

    #[test]
    fn format_parse_round_trip() {
        let partitioning = hive(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("region", DataType::Utf8, true),
        ]);
        let batch = sample_batch();

        for row in 0..batch.num_rows() {
            let segments = partitioning.format(&batch, row).unwrap();
            let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
            let expr = partitioning.parse(&refs).unwrap();
            // the parsed expression holds on the row it was formatted from
            assert_eq!(expr.evaluate_batch(&batch)[row], TriState::True);
        }
    }

    #[test]
    fn infer_types_from_observed_values() {
        let inferred = HivePartitioning::infer(&[
            vec!["a=1", "region=eu"],
            vec!["a=2", "region=7"],
        ]);
        let fields = inferred.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name(), "a");
        assert_eq!(fields[0].data_type(), &DataType::Int64);
        // "eu" forces Utf8 even though another value parses as an integer
        assert_eq!(fields[1].data_type(), &DataType::Utf8);
    }
}
