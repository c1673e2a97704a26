#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use jl_columnar::{Column, ColumnError};
use jl_frame::{FrameError, Relation};
use jl_types::{NullKind, Scalar, format_float};
use thiserror::Error;
use tracing::debug;

/// Field spellings read as missing by default, besides the empty field.
pub const DEFAULT_NA_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// How fields are interpreted while reading.
///
/// An empty field is always missing. `na_tokens` lists further spellings of
/// missing; with none, text like `NA` or `NaN` is kept as text. Files this
/// crate wrote should be read back with [`CsvReadOptions::empty_only`], since
/// the writer leaves such text unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReadOptions {
    pub na_tokens: Vec<String>,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            na_tokens: DEFAULT_NA_TOKENS.iter().map(|&token| token.to_owned()).collect(),
        }
    }
}

impl CsvReadOptions {
    #[must_use]
    pub fn empty_only() -> Self {
        Self {
            na_tokens: Vec::new(),
        }
    }

    fn is_na(&self, field: &str) -> bool {
        field.is_empty() || self.na_tokens.iter().any(|token| token == field)
    }
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("csv header '{0}' appears more than once")]
    DuplicateHeader(String),
    #[error("csv header at position {0} is empty")]
    EmptyHeader(usize),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Parse CSV text with a header row into a relation named `name`, reading
/// the default NA tokens as missing.
pub fn read_csv_str(name: &str, input: &str) -> Result<Relation, IoError> {
    read_csv_str_with_options(name, input, &CsvReadOptions::default())
}

/// Rows must all have as many fields as the header; a ragged row is an error
/// rather than being padded.
pub fn read_csv_str_with_options(
    name: &str,
    input: &str,
    options: &CsvReadOptions,
) -> Result<Relation, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .from_reader(input.as_bytes());

    let headers = reader.headers().cloned().map_err(IoError::from)?;

    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(IoError::MissingHeaders);
    }
    let mut seen = BTreeSet::new();
    for (idx, header) in headers.iter().enumerate() {
        if header.is_empty() {
            return Err(IoError::EmptyHeader(idx));
        }
        if !seen.insert(header) {
            return Err(IoError::DuplicateHeader(header.to_owned()));
        }
    }

    let header_count = headers.len();
    let row_hint = input.len() / (header_count * 8).max(1);
    let mut columns: Vec<Vec<Scalar>> = (0..header_count)
        .map(|_| Vec::with_capacity(row_hint))
        .collect();

    let mut row_count = 0_usize;
    for row in reader.records() {
        let record = row?;
        for (idx, col) in columns.iter_mut().enumerate() {
            let field = record.get(idx).unwrap_or_default();
            col.push(parse_scalar(field, options));
        }
        row_count += 1;
    }

    let out_columns = headers
        .iter()
        .zip(columns)
        .map(|(header, values)| Ok((header.to_owned(), Column::from_values(values)?)))
        .collect::<Result<Vec<_>, IoError>>()?;

    debug!(relation = name, rows = row_count, columns = header_count, "parsed csv");
    Ok(Relation::with_row_count(name, row_count, out_columns)?)
}

/// Parse raw bytes, rejecting input that is not valid UTF-8.
pub fn read_csv_bytes_with_options(
    name: &str,
    input: Vec<u8>,
    options: &CsvReadOptions,
) -> Result<Relation, IoError> {
    let text = String::from_utf8(input)?;
    read_csv_str_with_options(name, &text, options)
}

/// Read a CSV file; the relation is named after the file stem.
pub fn read_csv_path(path: &Path) -> Result<Relation, IoError> {
    read_csv_path_with_options(path, &CsvReadOptions::default())
}

pub fn read_csv_path_with_options(
    path: &Path,
    options: &CsvReadOptions,
) -> Result<Relation, IoError> {
    let name = path
        .file_stem()
        .map_or_else(|| "table".to_owned(), |stem| stem.to_string_lossy().into_owned());
    read_csv_bytes_with_options(&name, fs::read(path)?, options)
}

/// Serialize with a header row and no index column. Missing cells become
/// empty fields.
pub fn write_csv_string(relation: &Relation) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(relation.column_names())?;

    for row in relation.rows() {
        writer.write_record(row.into_iter().map(scalar_to_csv))?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn write_csv_path(relation: &Relation, path: &Path) -> Result<(), IoError> {
    fs::write(path, write_csv_string(relation)?)?;
    Ok(())
}

/// Missing only when the options say so; a `NaN` spelling that is not an NA
/// token stays text.
fn parse_scalar(field: &str, options: &CsvReadOptions) -> Scalar {
    let trimmed = field.trim();
    if options.is_na(trimmed) {
        return Scalar::Null(NullKind::Null);
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Scalar::Int64(value);
    }
    if let Some(value) = trimmed.parse::<f64>().ok().filter(|value| !value.is_nan()) {
        return Scalar::Float64(value);
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Scalar::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Scalar::Bool(false);
    }

    Scalar::Utf8(trimmed.to_owned())
}

fn scalar_to_csv(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null(_) => String::new(),
        Scalar::Bool(v) => v.to_string(),
        Scalar::Int64(v) => v.to_string(),
        Scalar::Float64(v) if v.is_nan() => String::new(),
        Scalar::Float64(v) => format_float(*v),
        Scalar::Utf8(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use jl_types::{DType, NullKind, Scalar};

    use super::{
        CsvReadOptions, IoError, read_csv_bytes_with_options, read_csv_path, read_csv_path_with_options,
        read_csv_str, read_csv_str_with_options, write_csv_path, write_csv_string,
    };

    #[test]
    fn csv_round_trip_preserves_null_and_numeric_shape() {
        let input = "id,value\n1,10\n2,\n3,3.5\n";
        let relation = read_csv_str("t", input).expect("read");
        let value_col = relation.column("value").expect("value");

        assert_eq!(value_col.values()[1], Scalar::Null(NullKind::NaN));

        let out = write_csv_string(&relation).expect("write");
        assert_eq!(out, "id,value\n1,10.0\n2,\n3,3.5\n");
    }

    #[test]
    fn header_order_is_preserved() {
        let input = "charlie,alpha,bravo\n1,2,3\n";
        let relation = read_csv_str("t", input).expect("parse");
        assert_eq!(relation.column_names(), &["charlie", "alpha", "bravo"]);
    }

    #[test]
    fn headers_only_gives_empty_relation() {
        let relation = read_csv_str("t", "x,y,z\n").expect("parse");
        assert_eq!(relation.shape(), (0, 3));
        for (_, column) in relation.columns() {
            assert!(column.is_empty());
        }
    }

    #[test]
    fn mixed_dtypes_are_inferred_per_column() {
        let input = "ints,floats,strings,bools,nulls\n\
                     1,1.5,hello,true,\n\
                     2,2.7,world,False,NA\n";
        let relation = read_csv_str("t", input).expect("parse");
        let dtype = |name: &str| relation.column(name).expect("column").dtype();
        assert_eq!(dtype("ints"), DType::Int64);
        assert_eq!(dtype("floats"), DType::Float64);
        assert_eq!(dtype("strings"), DType::Utf8);
        assert_eq!(dtype("bools"), DType::Bool);
        assert_eq!(dtype("nulls"), DType::Null);
        assert_eq!(
            relation.column("bools").expect("bools").values()[1],
            Scalar::Bool(false)
        );
    }

    #[test]
    fn text_mixed_with_numbers_becomes_text() {
        let relation = read_csv_str("t", "code\n7\nA7\n").expect("parse");
        let code = relation.column("code").expect("code");
        assert_eq!(code.dtype(), DType::Utf8);
        assert_eq!(code.values()[0], Scalar::from("7"));
    }

    #[test]
    fn quoted_fields_keep_commas_and_newlines() {
        let input = "name,address\n\"Smith, John\",\"123 Main St\nApt 4\"\n";
        let relation = read_csv_str("t", input).expect("parse");
        assert_eq!(
            relation.column("name").expect("name").values()[0],
            Scalar::from("Smith, John")
        );
        let written = write_csv_string(&relation).expect("write");
        let back = read_csv_str("t", &written).expect("reparse");
        assert!(back.semantic_eq(&relation));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let err = read_csv_str("t", "a,b\n1,2\n3\n").expect_err("ragged");
        assert!(matches!(err, IoError::Csv(_)));
    }

    #[test]
    fn duplicate_and_empty_headers_are_rejected() {
        let err = read_csv_str("t", "a,a\n1,2\n").expect_err("duplicate");
        assert!(matches!(err, IoError::DuplicateHeader(name) if name == "a"));

        let err = read_csv_str("t", "a,\n1,2\n").expect_err("empty header");
        assert!(matches!(err, IoError::EmptyHeader(1)));

        let err = read_csv_str("t", "").expect_err("no headers");
        assert!(matches!(err, IoError::MissingHeaders));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = read_csv_bytes_with_options(
            "t",
            vec![b'a', b'\n', 0xff, 0xfe, b'\n'],
            &CsvReadOptions::default(),
        )
        .expect_err("utf8");
        assert!(matches!(err, IoError::Utf8(_)));
    }

    #[test]
    fn path_round_trip_names_relation_after_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("employees.csv");
        let relation = read_csv_str("employees", "emp_id,name\n1,John\n2,\n").expect("parse");
        write_csv_path(&relation, &path).expect("write");

        let back = read_csv_path(&path).expect("read");
        assert_eq!(back.name(), "employees");
        assert!(back.semantic_eq(&relation));
    }

    #[test]
    fn text_spelled_like_na_survives_export_when_read_empty_only() {
        let relation = read_csv_str_with_options(
            "t",
            "k,region\n1,NA\n2,None\n3,null\n4,NaN\n5,\n",
            &CsvReadOptions::empty_only(),
        )
        .expect("parse");
        let region = relation.column("region").expect("region");
        assert_eq!(region.dtype(), DType::Utf8);
        assert_eq!(region.values()[0], Scalar::from("NA"));
        assert_eq!(region.values()[3], Scalar::from("NaN"));
        assert!(region.values()[4].is_missing());

        let written = write_csv_string(&relation).expect("write");
        assert_eq!(written, "k,region\n1,NA\n2,None\n3,null\n4,NaN\n5,\n");
        let back = read_csv_str_with_options("t", &written, &CsvReadOptions::empty_only())
            .expect("reparse");
        assert_eq!(back, relation);

        // The default reader treats the same tokens as missing.
        let lossy = read_csv_str("t", &written).expect("default read");
        assert_eq!(lossy.column("region").expect("region").dtype(), DType::Null);
    }

    #[test]
    fn custom_na_tokens_replace_the_defaults() {
        let options = CsvReadOptions {
            na_tokens: vec!["-".to_owned()],
        };
        let relation = read_csv_str_with_options("t", "v\n-\nNA\n", &options).expect("parse");
        let v = relation.column("v").expect("v");
        assert!(v.values()[0].is_missing());
        assert_eq!(v.values()[1], Scalar::from("NA"));
    }

    #[test]
    fn exported_file_reads_back_with_empty_only_options() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("regions.csv");
        let relation = read_csv_str_with_options(
            "regions",
            "id,region\n1,None\n2,\n",
            &CsvReadOptions::empty_only(),
        )
        .expect("parse");
        write_csv_path(&relation, &path).expect("write");
        let back = read_csv_path_with_options(&path, &CsvReadOptions::empty_only()).expect("read");
        assert_eq!(back, relation);
    }

    #[test]
    fn golden_output_has_no_index_column() {
        let input = "a,b,c\n1,hello,3.25\n2,,true\n";
        let relation = read_csv_str("t", input).expect("parse");
        let output = write_csv_string(&relation).expect("write");
        // Column c mixes float and bool, so true widens to 1.0.
        assert_eq!(output, "a,b,c\n1,hello,3.25\n2,,1.0\n");
    }
}
