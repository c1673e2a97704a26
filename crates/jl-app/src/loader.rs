use std::fmt;
use std::path::Path;

use jl_frame::Relation;
use jl_io::read_csv_path;
use jl_types::Scalar;
use tracing::info;

use crate::error::AppError;

/// Join key of both built-in sample tables.
pub const SAMPLE_KEY: &str = "emp_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSide {
    A,
    B,
}

impl fmt::Display for TableSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("table A"),
            Self::B => f.write_str("table B"),
        }
    }
}

/// Employees (ids 1..5) and Salaries (ids 2,3,4,6,7): three shared ids and
/// two unmatched rows on each side.
pub fn sample_relations() -> Result<(Relation, Relation), AppError> {
    let ints = |values: &[i64]| values.iter().copied().map(Scalar::Int64).collect::<Vec<_>>();
    let text = |values: &[&str]| values.iter().copied().map(Scalar::from).collect::<Vec<_>>();

    let employees = Relation::from_dict(
        "employees",
        vec![
            (SAMPLE_KEY, ints(&[1, 2, 3, 4, 5])),
            ("name", text(&["John", "Jane", "Bob", "Alice", "Charlie"])),
            ("department", text(&["IT", "HR", "IT", "Finance", "Marketing"])),
        ],
    )?;
    let salaries = Relation::from_dict(
        "salaries",
        vec![
            (SAMPLE_KEY, ints(&[2, 3, 4, 6, 7])),
            ("salary", ints(&[60000, 75000, 65000, 80000, 70000])),
            ("bonus", ints(&[5000, 7500, 6000, 8000, 7000])),
        ],
    )?;
    Ok((employees, salaries))
}

/// Read a user-supplied CSV table.
pub fn load_table(path: &Path) -> Result<Relation, AppError> {
    let relation = read_csv_path(path).map_err(|source| AppError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        rows = relation.len(),
        columns = relation.width(),
        "loaded table"
    );
    Ok(relation)
}

/// Key used when none was chosen: `emp_id` for the sample, otherwise the
/// table's first column.
#[must_use]
pub fn default_key(relation: &Relation, sample: bool) -> String {
    if sample {
        return SAMPLE_KEY.to_owned();
    }
    relation.column_names().first().cloned().unwrap_or_default()
}
