#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use jl_columnar::{Column, ColumnError};
use jl_types::Scalar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("column '{column}' has {actual} rows but the relation has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// A named, immutable table: ordered columns of equal length.
///
/// Rows are positional. Column order is the order columns were supplied in,
/// which is also the order they are displayed and exported in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    name: String,
    row_count: usize,
    columns: BTreeMap<String, Column>,
    column_order: Vec<String>,
}

impl Relation {
    pub fn new(name: impl Into<String>, columns: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let row_count = columns.first().map_or(0, |(_, column)| column.len());
        Self::with_row_count(name, row_count, columns)
    }

    /// Construct with an explicit row count, so a relation without columns
    /// can still carry rows.
    pub fn with_row_count(
        name: impl Into<String>,
        row_count: usize,
        columns: Vec<(String, Column)>,
    ) -> Result<Self, FrameError> {
        let mut map = BTreeMap::new();
        let mut column_order = Vec::with_capacity(columns.len());
        for (column_name, column) in columns {
            if column.len() != row_count {
                return Err(FrameError::LengthMismatch {
                    column: column_name,
                    expected: row_count,
                    actual: column.len(),
                });
            }
            if map.contains_key(&column_name) {
                return Err(FrameError::DuplicateColumn(column_name));
            }
            column_order.push(column_name.clone());
            map.insert(column_name, column);
        }

        Ok(Self {
            name: name.into(),
            row_count,
            columns: map,
            column_order,
        })
    }

    /// Construct from column vectors, inferring each column's dtype.
    ///
    /// ```ignore
    /// let employees = Relation::from_dict("employees", vec![
    ///     ("emp_id", vec![Scalar::Int64(1), Scalar::Int64(2)]),
    ///     ("name", vec![Scalar::from("John"), Scalar::from("Jane")]),
    /// ])?;
    /// ```
    pub fn from_dict(
        name: impl Into<String>,
        data: Vec<(&str, Vec<Scalar>)>,
    ) -> Result<Self, FrameError> {
        let columns = data
            .into_iter()
            .map(|(column_name, values)| {
                Ok((column_name.to_owned(), Column::from_values(values)?))
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        Self::new(name, columns)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.row_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.column_order.len()
    }

    /// `(rows, columns)`, as a dataframe reports its shape.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count, self.width())
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Columns in display order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> + '_ {
        self.column_order
            .iter()
            .filter_map(|name| self.columns.get(name).map(|column| (name.as_str(), column)))
    }

    #[must_use]
    pub fn row(&self, idx: usize) -> Option<Vec<&Scalar>> {
        if idx >= self.row_count {
            return None;
        }
        self.columns()
            .map(|(_, column)| column.value(idx))
            .collect::<Option<Vec<_>>>()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Scalar>> + '_ {
        (0..self.row_count).filter_map(|idx| self.row(idx))
    }

    /// Cell-wise equality treating all missing markers as equal. Names are
    /// ignored; column order matters.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.row_count == other.row_count
            && self.column_order == other.column_order
            && self
                .columns()
                .zip(other.columns())
                .all(|((_, left), (_, right))| left.semantic_eq(right))
    }
}

#[cfg(test)]
mod tests {
    use jl_columnar::Column;
    use jl_types::{DType, Scalar};

    use super::{FrameError, Relation};

    fn employees() -> Relation {
        Relation::from_dict(
            "employees",
            vec![
                ("emp_id", vec![Scalar::Int64(1), Scalar::Int64(2), Scalar::Int64(3)]),
                (
                    "name",
                    vec![Scalar::from("John"), Scalar::from("Jane"), Scalar::from("Bob")],
                ),
            ],
        )
        .expect("relation")
    }

    #[test]
    fn from_dict_preserves_supplied_column_order() {
        let relation = Relation::from_dict(
            "t",
            vec![
                ("zeta", vec![Scalar::Int64(1)]),
                ("alpha", vec![Scalar::Int64(2)]),
            ],
        )
        .expect("relation");
        assert_eq!(relation.column_names(), &["zeta", "alpha"]);
        assert_eq!(relation.shape(), (1, 2));
    }

    #[test]
    fn new_rejects_ragged_columns() {
        let err = Relation::new(
            "t",
            vec![
                (
                    "a".to_owned(),
                    Column::from_values(vec![Scalar::Int64(1), Scalar::Int64(2)]).expect("a"),
                ),
                (
                    "b".to_owned(),
                    Column::from_values(vec![Scalar::Int64(1)]).expect("b"),
                ),
            ],
        )
        .expect_err("ragged");
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn new_rejects_duplicate_columns() {
        let column = Column::from_values(vec![Scalar::Int64(1)]).expect("column");
        let err = Relation::new(
            "t",
            vec![("a".to_owned(), column.clone()), ("a".to_owned(), column)],
        )
        .expect_err("duplicate");
        assert!(matches!(err, FrameError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn columnless_relation_still_counts_rows() {
        let relation = Relation::with_row_count("empty", 2, Vec::new()).expect("relation");
        assert_eq!(relation.shape(), (2, 0));
        assert_eq!(relation.rows().count(), 2);
        assert!(relation.row(0).expect("row").is_empty());
    }

    #[test]
    fn rows_follow_display_order() {
        let names = employees()
            .rows()
            .map(|row| row[1].to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["John", "Jane", "Bob"]);
        let ids = employees().column("emp_id").expect("emp_id").dtype();
        assert_eq!(ids, DType::Int64);
    }

    #[test]
    fn row_out_of_range_is_none() {
        assert!(employees().row(3).is_none());
        assert_eq!(employees().row(0).expect("row").len(), 2);
    }

    #[test]
    fn semantic_eq_ignores_name() {
        let left = employees();
        let columns = left
            .columns()
            .map(|(name, column)| (name.to_owned(), column.clone()))
            .collect();
        let right = Relation::new("other", columns).expect("relation");
        assert!(left.semantic_eq(&right));
        assert_ne!(left, right);
    }
}
