#![forbid(unsafe_code)]

//! Declarative description of each join variant: what it means, the SQL it
//! corresponds to, and which regions of a two-set diagram it covers.

use std::fmt;
use std::str::FromStr;

use jl_join::JoinVariant;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FILLED_COLOR: &str = "#90EE90";
pub const EMPTY_COLOR: &str = "white";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionFill {
    Filled,
    Empty,
}

impl RegionFill {
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Filled => FILLED_COLOR,
            Self::Empty => EMPTY_COLOR,
        }
    }

    #[must_use]
    pub const fn is_filled(self) -> bool {
        matches!(self, Self::Filled)
    }
}

/// Fill of the three regions of a two-circle diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Regions {
    pub left_only: RegionFill,
    pub right_only: RegionFill,
    pub both: RegionFill,
}

/// Which key the SQL `WHERE` clause tests for `NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullCheck {
    None,
    LeftKey,
    RightKey,
    EitherKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantMetadata {
    pub variant: JoinVariant,
    pub description: &'static str,
    /// SQL join keyword between the two tables.
    pub keyword: &'static str,
    pub null_check: NullCheck,
    pub regions: Regions,
}

const fn regions(left_only: RegionFill, right_only: RegionFill, both: RegionFill) -> Regions {
    Regions {
        left_only,
        right_only,
        both,
    }
}

/// One entry per variant, in `JoinVariant::ALL` order.
pub static CATALOG: [VariantMetadata; 7] = {
    use RegionFill::{Empty, Filled};
    [
        VariantMetadata {
            variant: JoinVariant::Inner,
            description: "Returns only the matching records from both tables",
            keyword: "INNER JOIN",
            null_check: NullCheck::None,
            regions: regions(Empty, Empty, Filled),
        },
        VariantMetadata {
            variant: JoinVariant::Full,
            description: "Returns all records from both tables, matching where possible",
            keyword: "FULL JOIN",
            null_check: NullCheck::None,
            regions: regions(Filled, Filled, Filled),
        },
        VariantMetadata {
            variant: JoinVariant::FullWithNulls,
            description: "Returns only non-matching records from both tables",
            keyword: "FULL JOIN",
            null_check: NullCheck::EitherKey,
            regions: regions(Filled, Filled, Empty),
        },
        VariantMetadata {
            variant: JoinVariant::Left,
            description: "Returns all records from table A and matching records from table B",
            keyword: "LEFT JOIN",
            null_check: NullCheck::None,
            regions: regions(Filled, Empty, Filled),
        },
        VariantMetadata {
            variant: JoinVariant::LeftWithNull,
            description: "Returns only records from table A that don't match table B",
            keyword: "LEFT JOIN",
            null_check: NullCheck::RightKey,
            regions: regions(Filled, Empty, Empty),
        },
        VariantMetadata {
            variant: JoinVariant::Right,
            description: "Returns all records from table B and matching records from table A",
            keyword: "RIGHT JOIN",
            null_check: NullCheck::None,
            regions: regions(Empty, Filled, Filled),
        },
        VariantMetadata {
            variant: JoinVariant::RightWithNull,
            description: "Returns only records from table B that don't match table A",
            keyword: "RIGHT JOIN",
            null_check: NullCheck::LeftKey,
            regions: regions(Empty, Filled, Empty),
        },
    ]
};

#[must_use]
pub fn metadata(variant: JoinVariant) -> &'static VariantMetadata {
    let slot = match variant {
        JoinVariant::Inner => 0,
        JoinVariant::Full => 1,
        JoinVariant::FullWithNulls => 2,
        JoinVariant::Left => 3,
        JoinVariant::LeftWithNull => 4,
        JoinVariant::Right => 5,
        JoinVariant::RightWithNull => 6,
    };
    &CATALOG[slot]
}

/// Names interpolated into the SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlContext {
    pub table_a: String,
    pub table_b: String,
    pub alias_a: String,
    pub alias_b: String,
    pub key_a: String,
    pub key_b: String,
}

impl SqlContext {
    #[must_use]
    pub fn new(key_a: impl Into<String>, key_b: impl Into<String>) -> Self {
        Self {
            table_a: "table_a".to_owned(),
            table_b: "table_b".to_owned(),
            alias_a: "A".to_owned(),
            alias_b: "B".to_owned(),
            key_a: key_a.into(),
            key_b: key_b.into(),
        }
    }
}

/// Plain identifiers are emitted as-is; anything else is double-quoted.
fn quote_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_owned()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Render the display-only SQL statement for a variant.
#[must_use]
pub fn render_sql(variant: JoinVariant, ctx: &SqlContext) -> String {
    let meta = metadata(variant);
    let table_a = quote_identifier(&ctx.table_a);
    let table_b = quote_identifier(&ctx.table_b);
    let alias_a = quote_identifier(&ctx.alias_a);
    let alias_b = quote_identifier(&ctx.alias_b);
    let key_a = format!("{alias_a}.{}", quote_identifier(&ctx.key_a));
    let key_b = format!("{alias_b}.{}", quote_identifier(&ctx.key_b));

    let mut sql = format!(
        "SELECT *\nFROM {table_a} {alias_a}\n{} {table_b} {alias_b} ON {key_a} = {key_b}",
        meta.keyword
    );
    match meta.null_check {
        NullCheck::None => {}
        NullCheck::LeftKey => sql.push_str(&format!("\nWHERE {key_a} IS NULL")),
        NullCheck::RightKey => sql.push_str(&format!("\nWHERE {key_b} IS NULL")),
        NullCheck::EitherKey => {
            sql.push_str(&format!("\nWHERE {key_a} IS NULL OR {key_b} IS NULL"));
        }
    }
    sql
}

/// Join types offered when composing a statement by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryJoin {
    Inner,
    Left,
    Right,
    Full,
}

impl QueryJoin {
    pub const ALL: [Self; 4] = [Self::Inner, Self::Left, Self::Right, Self::Full];

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
        }
    }
}

impl fmt::Display for QueryJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown join type `{0}` (expected inner, left, right or full)")]
pub struct QueryJoinParseError(pub String);

impl FromStr for QueryJoin {
    type Err = QueryJoinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let word = lower.strip_suffix("join").map_or(lower.as_str(), str::trim_end);
        Self::ALL
            .into_iter()
            .find(|join| join.keyword().eq_ignore_ascii_case(word))
            .ok_or_else(|| QueryJoinParseError(s.trim().to_owned()))
    }
}

pub const DEFAULT_QUERY_CONDITION: &str = "A.emp_id = B.emp_id";

/// Compose a statement from a hand-written `ON` condition and an optional
/// `WHERE` clause. Both are pasted in verbatim; nothing is parsed or run.
/// A blank `WHERE` clause is left out.
#[must_use]
pub fn render_custom_sql(join: QueryJoin, condition: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!(
        "SELECT *\nFROM employees A\n{} JOIN salaries B\nON {}",
        join.keyword(),
        condition.trim()
    );
    if let Some(clause) = where_clause.map(str::trim).filter(|clause| !clause.is_empty()) {
        sql.push_str("\nWHERE ");
        sql.push_str(clause);
    }
    sql
}

/// Suggested export file name, e.g. `join_result_left_join_with_null.csv`.
#[must_use]
pub fn export_file_name(variant: JoinVariant) -> String {
    format!(
        "join_result_{}.csv",
        variant.label().to_lowercase().replace(' ', "_")
    )
}

/// Everything needed to draw the two-circle diagram for one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VennSpec {
    pub title: String,
    pub left_label: String,
    pub right_label: String,
    pub regions: Regions,
}

impl VennSpec {
    #[must_use]
    pub fn for_variant(
        variant: JoinVariant,
        left_name: &str,
        left_rows: usize,
        right_name: &str,
        right_rows: usize,
    ) -> Self {
        Self {
            title: variant.label().to_owned(),
            left_label: format!("{left_name}\n({left_rows} records)"),
            right_label: format!("{right_name}\n({right_rows} records)"),
            regions: metadata(variant).regions,
        }
    }
}

pub const LEARNING_NOTES: &str = "\
Key Concepts
- Primary Key: a unique identifier for each record (emp_id in the sample)
- Foreign Key: a field that links to a primary key in another table
- NULL values: represent missing or non-matching data

Common Use Cases
1. INNER JOIN: finding employees with salary records
2. LEFT JOIN: getting all employees, even those without salaries
3. RIGHT JOIN: getting all salary records, even for departed employees
4. FULL JOIN: complete view of all employee and salary data

Tips for Choosing JOINs
- Use INNER JOIN when you need only complete records
- Use LEFT/RIGHT JOIN when you need all records from one table
- Use FULL JOIN when you need all records from both tables
- Use WITH NULL variants to find missing or unmatched records
";

#[cfg(test)]
mod tests {
    use jl_join::JoinVariant;

    use super::{
        CATALOG, DEFAULT_QUERY_CONDITION, EMPTY_COLOR, FILLED_COLOR, QueryJoin, RegionFill,
        SqlContext, VennSpec, export_file_name, metadata, render_custom_sql, render_sql,
    };

    #[test]
    fn catalog_follows_variant_order() {
        for (entry, variant) in CATALOG.iter().zip(JoinVariant::ALL) {
            assert_eq!(entry.variant, variant);
            assert_eq!(metadata(variant).variant, variant);
        }
    }

    #[test]
    fn anti_joins_never_fill_the_intersection() {
        for variant in JoinVariant::ALL {
            let both = metadata(variant).regions.both;
            assert_eq!(both.is_filled(), !variant.is_anti_join(), "{variant}");
        }
    }

    #[test]
    fn region_colors_match_fill() {
        let regions = metadata(JoinVariant::Left).regions;
        assert_eq!(regions.left_only.color(), FILLED_COLOR);
        assert_eq!(regions.right_only.color(), EMPTY_COLOR);
        assert_eq!(regions.both, RegionFill::Filled);
    }

    #[test]
    fn inner_sql_interpolates_keys() {
        let sql = render_sql(JoinVariant::Inner, &SqlContext::new("emp_id", "emp_id"));
        assert_eq!(
            sql,
            "SELECT *\nFROM table_a A\nINNER JOIN table_b B ON A.emp_id = B.emp_id"
        );
    }

    #[test]
    fn anti_join_sql_adds_null_filters() {
        let ctx = SqlContext::new("emp_id", "id");
        assert!(
            render_sql(JoinVariant::LeftWithNull, &ctx)
                .ends_with("LEFT JOIN table_b B ON A.emp_id = B.id\nWHERE B.id IS NULL")
        );
        assert!(render_sql(JoinVariant::RightWithNull, &ctx).ends_with("WHERE A.emp_id IS NULL"));
        assert!(
            render_sql(JoinVariant::FullWithNulls, &ctx)
                .ends_with("WHERE A.emp_id IS NULL OR B.id IS NULL")
        );
    }

    #[test]
    fn unusual_identifiers_are_quoted() {
        let ctx = SqlContext {
            table_a: "2024 sales".to_owned(),
            ..SqlContext::new("order id", "x\"y")
        };
        let sql = render_sql(JoinVariant::Full, &ctx);
        assert!(sql.contains("FROM \"2024 sales\" A"));
        assert!(sql.contains("ON A.\"order id\" = B.\"x\"\"y\""));
    }

    #[test]
    fn custom_sql_without_where_clause() {
        let sql = render_custom_sql(QueryJoin::Left, DEFAULT_QUERY_CONDITION, None);
        assert_eq!(
            sql,
            "SELECT *\nFROM employees A\nLEFT JOIN salaries B\nON A.emp_id = B.emp_id"
        );
        assert_eq!(render_custom_sql(QueryJoin::Left, DEFAULT_QUERY_CONDITION, Some("  ")), sql);
    }

    #[test]
    fn custom_sql_pastes_clauses_verbatim() {
        let sql = render_custom_sql(
            QueryJoin::Full,
            "A.dept = B.dept AND A.emp_id <> B.emp_id",
            Some("B.salary > 60000 OR (A.name LIKE 'J%'"),
        );
        assert_eq!(
            sql,
            "SELECT *\nFROM employees A\nFULL JOIN salaries B\n\
             ON A.dept = B.dept AND A.emp_id <> B.emp_id\n\
             WHERE B.salary > 60000 OR (A.name LIKE 'J%'"
        );
    }

    #[test]
    fn query_join_parses_keywords_in_any_case() {
        assert_eq!("inner".parse::<QueryJoin>(), Ok(QueryJoin::Inner));
        assert_eq!("FULL JOIN".parse::<QueryJoin>(), Ok(QueryJoin::Full));
        assert_eq!(" Right ".parse::<QueryJoin>(), Ok(QueryJoin::Right));
        let err = "cross".parse::<QueryJoin>().expect_err("cross");
        assert_eq!(err.to_string(), "unknown join type `cross` (expected inner, left, right or full)");
    }

    #[test]
    fn export_names_use_snake_cased_labels() {
        assert_eq!(
            export_file_name(JoinVariant::LeftWithNull),
            "join_result_left_join_with_null.csv"
        );
        assert_eq!(export_file_name(JoinVariant::Inner), "join_result_inner_join.csv");
    }

    #[test]
    fn venn_labels_carry_row_counts() {
        let venn = VennSpec::for_variant(JoinVariant::Right, "Table A", 5, "Table B", 4);
        assert_eq!(venn.title, "RIGHT JOIN");
        assert_eq!(venn.left_label, "Table A\n(5 records)");
        assert_eq!(venn.right_label, "Table B\n(4 records)");
        assert_eq!(venn.regions, metadata(JoinVariant::Right).regions);
    }
}
