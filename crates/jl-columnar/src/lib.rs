#![forbid(unsafe_code)]

use jl_types::{DType, Scalar, TypeError, cast_scalar_owned, infer_dtype};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A typed column of scalars. Every value either has the column dtype or is
/// the column's missing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("column length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("row position {position} is out of bounds for column of length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl Column {
    /// Construct a column, coercing values to the target dtype.
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let needs_coercion = values.iter().any(|v| {
            let d = v.dtype();
            d != dtype && d != DType::Null
        });

        let coerced = if needs_coercion {
            values
                .into_iter()
                .map(|value| cast_scalar_owned(value, dtype))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            // Only remap Null variants to the dtype-specific missing marker.
            values
                .into_iter()
                .map(|value| match value {
                    Scalar::Null(_) => Scalar::missing_for_dtype(dtype),
                    other => other,
                })
                .collect()
        };

        Ok(Self {
            dtype,
            values: coerced,
        })
    }

    pub fn from_values(values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let dtype = infer_dtype(&values)?;
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    /// Gather values by position; `None` slots become the missing marker of
    /// this column's dtype.
    pub fn reindex_by_positions(&self, positions: &[Option<usize>]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|slot| match slot {
                Some(idx) => self
                    .values
                    .get(*idx)
                    .cloned()
                    .ok_or(ColumnError::PositionOutOfBounds {
                        position: *idx,
                        len: self.values.len(),
                    }),
                None => Ok(Scalar::missing_for_dtype(self.dtype)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(self.dtype, values)
    }

    /// Element-wise coalesce: take `self` where present, else `other`.
    pub fn coalesce(&self, other: &Self) -> Result<Self, ColumnError> {
        if self.len() != other.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(left, right)| left.coalesce(right))
            .collect::<Vec<_>>();
        Self::from_values(values)
    }

    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(left, right)| left.semantic_eq(right))
    }
}

#[cfg(test)]
mod tests {
    use jl_types::{DType, NullKind, Scalar};

    use super::{Column, ColumnError};

    #[test]
    fn reindex_injects_missing_values() {
        let column = Column::from_values(vec![Scalar::Int64(10), Scalar::Int64(20)])
            .expect("column should build");

        let out = column
            .reindex_by_positions(&[Some(1), None, Some(0)])
            .expect("reindex should work");

        assert_eq!(
            out.values(),
            &[
                Scalar::Int64(20),
                Scalar::Null(NullKind::Null),
                Scalar::Int64(10)
            ]
        );
        assert_eq!(out.dtype(), DType::Int64);
    }

    #[test]
    fn reindex_float_column_pads_with_nan() {
        let column = Column::from_values(vec![Scalar::Float64(1.5)]).expect("column");
        let out = column.reindex_by_positions(&[None]).expect("reindex");
        assert_eq!(out.values(), &[Scalar::Null(NullKind::NaN)]);
    }

    #[test]
    fn reindex_rejects_out_of_bounds_positions() {
        let column = Column::from_values(vec![Scalar::Int64(1)]).expect("column");
        let err = column
            .reindex_by_positions(&[Some(3)])
            .expect_err("must fail");
        assert_eq!(err, ColumnError::PositionOutOfBounds { position: 3, len: 1 });
    }

    #[test]
    fn coalesce_prefers_left_values() {
        let left = Column::from_values(vec![Scalar::Int64(1), Scalar::Null(NullKind::Null)])
            .expect("left");
        let right = Column::from_values(vec![Scalar::Int64(9), Scalar::Int64(7)]).expect("right");
        let out = left.coalesce(&right).expect("coalesce");
        assert_eq!(out.values(), &[Scalar::Int64(1), Scalar::Int64(7)]);
    }

    #[test]
    fn mixed_int_and_float_values_coerce_to_float() {
        let column = Column::from_values(vec![
            Scalar::Int64(1),
            Scalar::Float64(2.5),
            Scalar::Null(NullKind::Null),
        ])
        .expect("column");
        assert_eq!(column.dtype(), DType::Float64);
        assert_eq!(
            column.values(),
            &[
                Scalar::Float64(1.0),
                Scalar::Float64(2.5),
                Scalar::Null(NullKind::NaN)
            ]
        );
    }

    #[test]
    fn column_serde_keeps_dtype_and_markers() {
        let column = Column::from_values(vec![Scalar::from("a"), Scalar::Null(NullKind::Null)])
            .expect("column");
        let json = serde_json::to_string(&column).expect("serialize");
        let back: Column = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, column);
        assert_eq!(back.dtype(), DType::Utf8);
    }
}
