use std::{cmp::Ordering, fmt, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray,
    },
    datatypes::{Float64Type, Int32Type, Int64Type},
};
use arrow_schema::DataType;

use crate::error::PartitionError;

/// An owned partition-literal value.
///
/// Partition keys cover a deliberately narrow slice of the arrow type system:
/// the types that can round-trip through a path segment.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::Int32(_) => DataType::Int32,
            Scalar::Int64(_) => DataType::Int64,
            Scalar::Float64(_) => DataType::Float64,
            Scalar::Utf8(_) => DataType::Utf8,
        }
    }

    /// Parse a path-segment value into a scalar of the declared field type.
    pub fn parse_str(field: &str, value: &str, target: &DataType) -> Result<Self, PartitionError> {
        let mismatch = || PartitionError::TypeMismatch {
            field: field.to_string(),
            value: value.to_string(),
            target: target.clone(),
        };
        match target {
            DataType::Boolean => match value {
                "true" => Ok(Scalar::Bool(true)),
                "false" => Ok(Scalar::Bool(false)),
                _ => Err(mismatch()),
            },
            DataType::Int32 => value.parse().map(Scalar::Int32).map_err(|_| mismatch()),
            DataType::Int64 => value.parse().map(Scalar::Int64).map_err(|_| mismatch()),
            DataType::Float64 => value.parse().map(Scalar::Float64).map_err(|_| mismatch()),
            DataType::Utf8 => Ok(Scalar::Utf8(value.to_string())),
            _ => Err(mismatch()),
        }
    }

    /// The path-segment text for this value (no type tag, unlike `Display`).
    pub fn to_segment_text(&self) -> String {
        match self {
            Scalar::Bool(v) => v.to_string(),
            Scalar::Int32(v) => v.to_string(),
            Scalar::Int64(v) => v.to_string(),
            Scalar::Float64(v) => v.to_string(),
            Scalar::Utf8(v) => v.clone(),
        }
    }

    /// Extract the value at `row` from a column. `Ok(None)` means null.
    pub(crate) fn from_array(
        field: &str,
        column: &ArrayRef,
        row: usize,
    ) -> Result<Option<Self>, PartitionError> {
        if column.is_null(row) {
            return Ok(None);
        }
        let scalar = match column.data_type() {
            DataType::Boolean => Scalar::Bool(column.as_boolean().value(row)),
            DataType::Int32 => Scalar::Int32(column.as_primitive::<Int32Type>().value(row)),
            DataType::Int64 => Scalar::Int64(column.as_primitive::<Int64Type>().value(row)),
            DataType::Float64 => Scalar::Float64(column.as_primitive::<Float64Type>().value(row)),
            DataType::Utf8 => Scalar::Utf8(column.as_string::<i32>().value(row).to_string()),
            other => {
                return Err(PartitionError::TypeMismatch {
                    field: field.to_string(),
                    value: format!("<{other:?} column>"),
                    target: DataType::Utf8,
                });
            }
        };
        Ok(Some(scalar))
    }

    /// Cast this value to `target`, the implicit coercion applied to
    /// partition columns whose storage type differs from the declared
    /// partition field type.
    pub fn cast_to(&self, field: &str, target: &DataType) -> Result<Self, PartitionError> {
        if self.data_type() == *target {
            return Ok(self.clone());
        }
        let mismatch = || PartitionError::TypeMismatch {
            field: field.to_string(),
            value: self.to_segment_text(),
            target: target.clone(),
        };
        match (self, target) {
            (_, DataType::Utf8) => Ok(Scalar::Utf8(self.to_segment_text())),
            (Scalar::Utf8(v), _) => Scalar::parse_str(field, v, target),
            (Scalar::Int32(v), DataType::Int64) => Ok(Scalar::Int64(*v as i64)),
            (Scalar::Int64(v), DataType::Int32) => {
                i32::try_from(*v).map(Scalar::Int32).map_err(|_| mismatch())
            }
            (Scalar::Int32(v), DataType::Float64) => Ok(Scalar::Float64(*v as f64)),
            (Scalar::Int64(v), DataType::Float64) => Ok(Scalar::Float64(*v as f64)),
            _ => Err(mismatch()),
        }
    }

    /// Materialize this value as a constant column of length `len`.
    pub(crate) fn to_array(&self, len: usize) -> ArrayRef {
        match self {
            Scalar::Bool(v) => Arc::new(BooleanArray::from(vec![*v; len])),
            Scalar::Int32(v) => Arc::new(Int32Array::from(vec![*v; len])),
            Scalar::Int64(v) => Arc::new(Int64Array::from(vec![*v; len])),
            Scalar::Float64(v) => Arc::new(Float64Array::from(vec![*v; len])),
            Scalar::Utf8(v) => Arc::new(StringArray::from(vec![v.as_str(); len])),
        }
    }

    /// Ordering between two scalars; `None` when the types are incomparable.
    pub(crate) fn compare(&self, other: &Scalar) -> Option<Ordering> {
        use Scalar::*;
        match (self, other) {
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Utf8(a), Utf8(b)) => Some(a.cmp(b)),
            (Int32(a), Int32(b)) => Some(a.cmp(b)),
            (Int64(a), Int64(b)) => Some(a.cmp(b)),
            (Int32(a), Int64(b)) => Some((*a as i64).cmp(b)),
            (Int64(a), Int32(b)) => Some(a.cmp(&(*b as i64))),
            (Float64(a), Float64(b)) => a.partial_cmp(b),
            (Int32(a), Float64(b)) => (*a as f64).partial_cmp(b),
            (Float64(a), Int32(b)) => a.partial_cmp(&(*b as f64)),
            (Int64(a), Float64(b)) => (*a as f64).partial_cmp(b),
            (Float64(a), Int64(b)) => a.partial_cmp(&(*b as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "Bool({v})"),
            Scalar::Int32(v) => write!(f, "Int32({v})"),
            Scalar::Int64(v) => write!(f, "Int64({v})"),
            Scalar::Float64(v) => write!(f, "Float64({v})"),
            Scalar::Utf8(v) => write!(f, "Utf8(\"{v}\")"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_by_declared_type() {
        assert_eq!(
            Scalar::parse_str("a", "42", &DataType::Int64).unwrap(),
            Scalar::Int64(42)
        );
        assert_eq!(
            Scalar::parse_str("a", "42", &DataType::Utf8).unwrap(),
            Scalar::Utf8("42".to_string())
        );
        assert_eq!(
            Scalar::parse_str("flag", "true", &DataType::Boolean).unwrap(),
            Scalar::Bool(true)
        );
        assert!(matches!(
            Scalar::parse_str("a", "notanint", &DataType::Int64),
            Err(PartitionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn segment_text_round_trips() {
        for (scalar, target) in [
            (Scalar::Int64(7), DataType::Int64),
            (Scalar::Utf8("x".into()), DataType::Utf8),
            (Scalar::Bool(false), DataType::Boolean),
        ] {
            let text = scalar.to_segment_text();
            assert_eq!(Scalar::parse_str("k", &text, &target).unwrap(), scalar);
        }
    }

    #[test]
    fn implicit_cast_to_utf8() {
        let casted = Scalar::Int64(3).cast_to("a", &DataType::Utf8).unwrap();
        assert_eq!(casted, Scalar::Utf8("3".to_string()));
    }

    #[test]
    fn narrowing_cast_checks_range() {
        assert_eq!(
            Scalar::Int64(12).cast_to("a", &DataType::Int32).unwrap(),
            Scalar::Int32(12)
        );
        assert!(Scalar::Int64(i64::MAX).cast_to("a", &DataType::Int32).is_err());
    }

    #[test]
    fn cross_width_integer_compare() {
        assert_eq!(
            Scalar::Int32(5).compare(&Scalar::Int64(5)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Scalar::Int64(5).compare(&Scalar::Utf8("5".into())),
            None
        );
    }
}
