use std::{cmp::Ordering, collections::HashMap, fmt};

use arrow::array::RecordBatch;

use crate::scalar::Scalar;

/// Three-valued logic used when evaluating an expression against partial
/// information (e.g. a filter against the fixed bindings of a fragment's
/// partition expression, where most columns are unbound).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TriState {
    True,
    False,
    Unknown,
}

impl TriState {
    pub(crate) fn and(self, other: Self) -> Self {
        match (self, other) {
            (TriState::False, _) | (_, TriState::False) => TriState::False,
            (TriState::True, TriState::True) => TriState::True,
            _ => TriState::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CmpOp {
    fn matches(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::NotEq => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::LtEq => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::GtEq => ord != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
        }
    }
}

/// The field/value bindings implied by the `=` conjuncts of an expression.
pub type Bindings = HashMap<String, Scalar>;

/// Constraint tree derived from a fragment's location, or supplied as a scan
/// filter: comparisons over named fields, combined by conjunction.
///
/// Trees are immutable once built. Construction never fails; malformed input
/// is rejected by the builder side ([`Partitioning`](crate::partition::Partitioning)),
/// not at evaluation time.
#[derive(Clone, Debug, PartialEq)]
pub enum PartitionExpr {
    /// The trivial constraint; the expression of an unpartitioned fragment.
    True,
    Cmp {
        field: String,
        op: CmpOp,
        value: Scalar,
    },
    And(Vec<PartitionExpr>),
}

impl PartitionExpr {
    /// Build a comparison with an explicit operator.
    pub fn cmp(field: impl Into<String>, op: CmpOp, value: Scalar) -> Self {
        PartitionExpr::Cmp {
            field: field.into(),
            op,
            value,
        }
    }

    /// Build an equality constraint (`field = value`).
    pub fn eq(field: impl Into<String>, value: Scalar) -> Self {
        Self::cmp(field, CmpOp::Eq, value)
    }

    /// Build a conjunction, normalizing the degenerate arities.
    pub fn and(mut parts: Vec<PartitionExpr>) -> Self {
        parts.retain(|p| !matches!(p, PartitionExpr::True));
        match parts.len() {
            0 => PartitionExpr::True,
            1 => parts.into_iter().next().unwrap_or(PartitionExpr::True),
            _ => PartitionExpr::And(parts),
        }
    }

    /// Logical AND with another expression, flattening nested conjunctions.
    /// Used when composing nested directory levels.
    pub fn merge(self, other: PartitionExpr) -> PartitionExpr {
        let mut parts = Vec::new();
        for expr in [self, other] {
            match expr {
                PartitionExpr::True => {}
                PartitionExpr::And(inner) => parts.extend(inner),
                leaf => parts.push(leaf),
            }
        }
        PartitionExpr::and(parts)
    }

    /// The `field = value` bindings this expression pins down.
    pub fn bindings(&self) -> Bindings {
        let mut out = Bindings::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings(&self, out: &mut Bindings) {
        match self {
            PartitionExpr::True => {}
            PartitionExpr::Cmp {
                field,
                op: CmpOp::Eq,
                value,
            } => {
                out.insert(field.clone(), value.clone());
            }
            PartitionExpr::Cmp { .. } => {}
            PartitionExpr::And(parts) => {
                for part in parts {
                    part.collect_bindings(out);
                }
            }
        }
    }

    /// Evaluate against fixed bindings. Fields absent from `bindings` make
    /// the comparison `Unknown`; `False` here is the pruning signal — the
    /// expression can never hold for rows under those bindings.
    pub fn evaluate_bindings(&self, bindings: &Bindings) -> TriState {
        match self {
            PartitionExpr::True => TriState::True,
            PartitionExpr::Cmp { field, op, value } => match bindings.get(field) {
                None => TriState::Unknown,
                Some(bound) => match bound.compare(value) {
                    None => TriState::Unknown,
                    Some(ord) => {
                        if op.matches(ord) {
                            TriState::True
                        } else {
                            TriState::False
                        }
                    }
                },
            },
            PartitionExpr::And(parts) => parts
                .iter()
                .fold(TriState::True, |acc, p| acc.and(p.evaluate_bindings(bindings))),
        }
    }

    /// Evaluate per row against a batch. Columns missing from the batch (or
    /// of a type scalars cannot represent) yield `Unknown`; null cells
    /// compare `False`.
    pub fn evaluate_batch(&self, batch: &RecordBatch) -> Vec<TriState> {
        let rows = batch.num_rows();
        match self {
            PartitionExpr::True => vec![TriState::True; rows],
            PartitionExpr::Cmp { field, op, value } => {
                let Ok(idx) = batch.schema().index_of(field) else {
                    return vec![TriState::Unknown; rows];
                };
                let column = batch.column(idx).clone();
                (0..rows)
                    .map(|row| match Scalar::from_array(field, &column, row) {
                        Err(_) => TriState::Unknown,
                        Ok(None) => TriState::False,
                        Ok(Some(cell)) => match cell.compare(value) {
                            None => TriState::Unknown,
                            Some(ord) => {
                                if op.matches(ord) {
                                    TriState::True
                                } else {
                                    TriState::False
                                }
                            }
                        },
                    })
                    .collect()
            }
            PartitionExpr::And(parts) => {
                let mut acc = vec![TriState::True; rows];
                for part in parts {
                    let next = part.evaluate_batch(batch);
                    for (a, b) in acc.iter_mut().zip(next) {
                        *a = a.and(b);
                    }
                }
                acc
            }
        }
    }
}

impl fmt::Display for PartitionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionExpr::True => write!(f, "TRUE"),
            PartitionExpr::Cmp { field, op, value } => {
                write!(f, "{} {} {}", field, op.symbol(), value)
            }
            PartitionExpr::And(parts) => {
                if parts.is_empty() {
                    return write!(f, "TRUE");
                }
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}
