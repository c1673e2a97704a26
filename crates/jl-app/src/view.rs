use jl_catalog::{SqlContext, VennSpec, export_file_name, metadata, render_sql};
use jl_frame::Relation;
use jl_join::{JoinVariant, JoinedRelation};
use serde::{Deserialize, Serialize};

/// A relation flattened to display strings; missing cells read `NaN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableSnapshot {
    #[must_use]
    pub fn from_relation(relation: &Relation) -> Self {
        Self {
            shape: relation.shape(),
            columns: relation.column_names().to_vec(),
            rows: relation
                .rows()
                .map(|row| row.into_iter().map(ToString::to_string).collect())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPanel {
    pub title: String,
    pub relation: String,
    pub key: String,
    pub table: TableSnapshot,
}

/// Where the result rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSummary {
    pub rows: usize,
    pub matched: usize,
    pub left_only: usize,
    pub right_only: usize,
}

impl JoinSummary {
    #[must_use]
    pub fn of(joined: &JoinedRelation) -> Self {
        Self {
            rows: joined.len(),
            matched: joined.matched_count(),
            left_only: joined.left_only_count(),
            right_only: joined.right_only_count(),
        }
    }
}

/// Everything shown for one evaluation of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinView {
    pub variant: JoinVariant,
    pub label: String,
    pub description: String,
    pub sql: String,
    pub venn: VennSpec,
    /// Empty when input tables are hidden.
    pub inputs: Vec<InputPanel>,
    /// `None` when the result table is hidden.
    pub result: Option<TableSnapshot>,
    pub summary: JoinSummary,
    pub export_file_name: String,
}

/// The pieces of session state a view is assembled from.
#[derive(Debug, Clone, Copy)]
pub struct ViewInputs<'a> {
    pub variant: JoinVariant,
    pub table_a: &'a Relation,
    pub table_b: &'a Relation,
    pub key_a: &'a str,
    pub key_b: &'a str,
    pub table_a_name: &'a str,
    pub table_b_name: &'a str,
    pub show_tables: bool,
    pub show_result: bool,
}

impl JoinView {
    #[must_use]
    pub fn build(inputs: &ViewInputs<'_>, joined: &JoinedRelation) -> Self {
        let meta = metadata(inputs.variant);
        let panels = if inputs.show_tables {
            vec![
                InputPanel {
                    title: inputs.table_a_name.to_owned(),
                    relation: inputs.table_a.name().to_owned(),
                    key: inputs.key_a.to_owned(),
                    table: TableSnapshot::from_relation(inputs.table_a),
                },
                InputPanel {
                    title: inputs.table_b_name.to_owned(),
                    relation: inputs.table_b.name().to_owned(),
                    key: inputs.key_b.to_owned(),
                    table: TableSnapshot::from_relation(inputs.table_b),
                },
            ]
        } else {
            Vec::new()
        };

        Self {
            variant: inputs.variant,
            label: inputs.variant.label().to_owned(),
            description: meta.description.to_owned(),
            sql: render_sql(inputs.variant, &SqlContext::new(inputs.key_a, inputs.key_b)),
            venn: VennSpec::for_variant(
                inputs.variant,
                inputs.table_a_name,
                inputs.table_a.len(),
                inputs.table_b_name,
                inputs.table_b.len(),
            ),
            inputs: panels,
            result: inputs
                .show_result
                .then(|| TableSnapshot::from_relation(joined.relation())),
            summary: JoinSummary::of(joined),
            export_file_name: export_file_name(inputs.variant),
        }
    }
}
