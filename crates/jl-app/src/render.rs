use std::fmt::Write as _;

use jl_catalog::{RegionFill, VennSpec};

use crate::error::AppError;
use crate::view::{InputPanel, JoinView, TableSnapshot};

const REGION_WIDTH: usize = 9;

/// Right-aligned text table with a leading row index, the way a dataframe
/// prints itself.
#[must_use]
pub fn render_table(table: &TableSnapshot) -> String {
    let index_width = table.rows.len().saturating_sub(1).to_string().len();
    let widths = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            table
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.chars().count())
                .chain([name.chars().count()])
                .max()
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();

    let mut out = String::new();
    let _ = write!(out, "{:index_width$}", "");
    for (name, width) in table.columns.iter().zip(widths.iter().copied()) {
        let _ = write!(out, "  {name:>width$}");
    }
    out.push('\n');

    for (idx, row) in table.rows.iter().enumerate() {
        let _ = write!(out, "{idx:<index_width$}");
        for (cell, width) in row.iter().zip(widths.iter().copied()) {
            let _ = write!(out, "  {cell:>width$}");
        }
        out.push('\n');
    }
    if table.rows.is_empty() {
        out.push_str("(no rows)\n");
    }
    out
}

fn shape_line(shape: (usize, usize)) -> String {
    format!("shape: ({}, {})", shape.0, shape.1)
}

fn region(fill: RegionFill) -> String {
    let mark = if fill.is_filled() { '#' } else { '.' };
    std::iter::repeat_n(mark, REGION_WIDTH).collect()
}

/// Two overlapping sets drawn as three bracketed regions.
#[must_use]
pub fn render_venn(venn: &VennSpec) -> String {
    let left = venn.left_label.replace('\n', " ");
    let right = venn.right_label.replace('\n', " ");
    let regions = venn.regions;
    let pad = REGION_WIDTH + 2;
    format!(
        "{title}\n\
         A = {left}\n\
         B = {right}\n\
         ({a} ({both}) {b})\n \
         {la:^pad$}{lboth:^pad$}{lb:^pad$}\n\
         # = {filled}, . = {empty}\n",
        title = venn.title,
        a = region(regions.left_only),
        both = region(regions.both),
        b = region(regions.right_only),
        la = "A only",
        lboth = "A and B",
        lb = "B only",
        filled = RegionFill::Filled.color(),
        empty = RegionFill::Empty.color(),
    )
}

fn render_panel(panel: &InputPanel) -> String {
    format!(
        "{} ({}) {}, key: {}\n{}",
        panel.title,
        panel.relation,
        shape_line(panel.table.shape),
        panel.key,
        render_table(&panel.table)
    )
}

/// The full text view: description, diagram, SQL, inputs and result.
#[must_use]
pub fn render_view(view: &JoinView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", view.label);
    let _ = writeln!(out, "{}\n", view.description);
    out.push_str(&render_venn(&view.venn));
    let _ = writeln!(out, "\nSQL:\n{}\n", view.sql);

    for panel in &view.inputs {
        out.push_str(&render_panel(panel));
        out.push('\n');
    }

    if let Some(result) = &view.result {
        let _ = writeln!(out, "Result {}", shape_line(result.shape));
        out.push_str(&render_table(result));
        out.push('\n');
    }

    let summary = view.summary;
    let _ = writeln!(
        out,
        "{} rows: {} matched, {} only in A, {} only in B",
        summary.rows, summary.matched, summary.left_only, summary.right_only
    );
    let _ = writeln!(out, "export as: {}", view.export_file_name);
    out
}

pub fn render_json(view: &JoinView) -> Result<String, AppError> {
    serde_json::to_string_pretty(view).map_err(AppError::Json)
}

#[cfg(test)]
mod tests {
    use jl_catalog::VennSpec;
    use jl_join::JoinVariant;

    use super::{render_json, render_table, render_venn, render_view};
    use crate::config::AppConfig;
    use crate::session::SessionState;
    use crate::view::{JoinView, TableSnapshot};

    fn view(variant: JoinVariant) -> JoinView {
        SessionState::from_config(&AppConfig::default())
            .expect("state")
            .with_variant(variant)
            .evaluate()
            .expect("evaluate")
            .view
    }

    #[test]
    fn table_is_right_aligned_with_index() {
        let table = TableSnapshot {
            shape: (2, 2),
            columns: vec!["id".to_owned(), "name".to_owned()],
            rows: vec![
                vec!["1".to_owned(), "Jo".to_owned()],
                vec!["10".to_owned(), "NaN".to_owned()],
            ],
        };
        assert_eq!(render_table(&table), "   id  name\n0   1    Jo\n1  10   NaN\n");
    }

    #[test]
    fn widths_count_characters_not_bytes() {
        let table = TableSnapshot {
            shape: (2, 1),
            columns: vec!["name".to_owned()],
            rows: vec![vec!["José".to_owned()], vec!["Ann".to_owned()]],
        };
        assert_eq!(render_table(&table), "   name\n0  José\n1   Ann\n");
    }

    #[test]
    fn empty_table_says_so() {
        let table = TableSnapshot {
            shape: (0, 1),
            columns: vec!["id".to_owned()],
            rows: Vec::new(),
        };
        assert!(render_table(&table).ends_with("(no rows)\n"));
    }

    #[test]
    fn venn_marks_filled_regions() {
        let venn = VennSpec::for_variant(JoinVariant::LeftWithNull, "Table A", 5, "Table B", 5);
        let text = render_venn(&venn);
        assert!(text.starts_with("LEFT JOIN WITH NULL\n"));
        assert!(text.contains("A = Table A (5 records)"));
        assert!(text.contains("(######### (.........) .........)"));
    }

    #[test]
    fn left_join_view_shows_padding_as_nan() {
        let text = render_view(&view(JoinVariant::Left));
        assert!(text.contains("== LEFT JOIN =="));
        assert!(text.contains("LEFT JOIN table_b B ON A.emp_id = B.emp_id"));
        assert!(text.contains("Result shape: (5, 5)"));
        assert!(text.contains("NaN"));
        assert!(text.contains("5 rows: 3 matched, 2 only in A, 0 only in B"));
        assert!(text.contains("export as: join_result_left_join.csv"));
    }

    #[test]
    fn json_view_carries_regions_and_rows() {
        let json = render_json(&view(JoinVariant::RightWithNull)).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["variant"], "right_with_null");
        assert_eq!(value["venn"]["regions"]["right_only"], "filled");
        assert_eq!(value["venn"]["regions"]["both"], "empty");
        assert_eq!(value["summary"]["rows"], 2);
        assert_eq!(value["result"]["rows"][0][0], "6");
    }
}
