#![forbid(unsafe_code)]

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    mem::size_of,
    str::FromStr,
};

use bumpalo::{Bump, collections::Vec as BumpVec};
use jl_columnar::{Column, ColumnError};
use jl_frame::{FrameError, Relation};
use jl_types::JoinKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The seven join variants the engine evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinVariant {
    Inner,
    Full,
    FullWithNulls,
    Left,
    LeftWithNull,
    Right,
    RightWithNull,
}

/// Base merge strategy; `Outer` is the full outer join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
}

/// Which rows of the base merge survive, decided by side of origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFilter {
    All,
    LeftMissing,
    RightMissing,
    EitherMissing,
}

impl RowFilter {
    #[must_use]
    pub fn keeps(self, left: Option<usize>, right: Option<usize>) -> bool {
        match self {
            Self::All => true,
            Self::LeftMissing => left.is_none(),
            Self::RightMissing => right.is_none(),
            Self::EitherMissing => left.is_none() || right.is_none(),
        }
    }
}

/// How a variant is evaluated: a base merge followed by a row filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlan {
    pub how: JoinType,
    pub keep: RowFilter,
}

impl JoinVariant {
    pub const ALL: [Self; 7] = [
        Self::Inner,
        Self::Full,
        Self::FullWithNulls,
        Self::Left,
        Self::LeftWithNull,
        Self::Right,
        Self::RightWithNull,
    ];

    #[must_use]
    pub const fn plan(self) -> JoinPlan {
        let (how, keep) = match self {
            Self::Inner => (JoinType::Inner, RowFilter::All),
            Self::Full => (JoinType::Outer, RowFilter::All),
            Self::FullWithNulls => (JoinType::Outer, RowFilter::EitherMissing),
            Self::Left => (JoinType::Left, RowFilter::All),
            Self::LeftWithNull => (JoinType::Left, RowFilter::RightMissing),
            Self::Right => (JoinType::Right, RowFilter::All),
            Self::RightWithNull => (JoinType::Right, RowFilter::LeftMissing),
        };
        JoinPlan { how, keep }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Full => "FULL JOIN",
            Self::FullWithNulls => "FULL JOIN WITH NULLS",
            Self::Left => "LEFT JOIN",
            Self::LeftWithNull => "LEFT JOIN WITH NULL",
            Self::Right => "RIGHT JOIN",
            Self::RightWithNull => "RIGHT JOIN WITH NULL",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Full => "full",
            Self::FullWithNulls => "full_with_nulls",
            Self::Left => "left",
            Self::LeftWithNull => "left_with_null",
            Self::Right => "right",
            Self::RightWithNull => "right_with_null",
        }
    }

    /// Whether the variant only keeps rows without a counterpart.
    #[must_use]
    pub const fn is_anti_join(self) -> bool {
        !matches!(self.plan().keep, RowFilter::All)
    }
}

impl fmt::Display for JoinVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown join variant '{input}' (expected one of: {})", expected_names())]
pub struct VariantParseError {
    pub input: String,
}

fn expected_names() -> String {
    JoinVariant::ALL
        .iter()
        .map(|variant| variant.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for JoinVariant {
    type Err = VariantParseError;

    /// Accepts the label (`LEFT JOIN WITH NULL`), the snake-case name
    /// (`left_with_null`) or a kebab-case name, in any case. A trailing
    /// `JOIN` in the short forms is optional.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input
            .trim()
            .to_ascii_lowercase()
            .replace(['-', ' '], "_")
            .replace("_join", "");
        Self::ALL
            .into_iter()
            .find(|variant| variant.name() == normalized)
            .ok_or_else(|| VariantParseError {
                input: input.to_owned(),
            })
    }
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("join key '{column}' is not a column of {relation} (available: {})", .available.join(", "))]
    InvalidKey {
        relation: String,
        column: String,
        available: Vec<String>,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

pub const DEFAULT_ARENA_BUDGET_BYTES: usize = 256 * 1024 * 1024;
pub const DEFAULT_SUFFIXES: (&str, &str) = ("_x", "_y");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOptions {
    pub use_arena: bool,
    pub arena_budget_bytes: usize,
    /// Appended to non-key column names present in both relations.
    pub suffixes: (String, String),
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            use_arena: true,
            arena_budget_bytes: DEFAULT_ARENA_BUDGET_BYTES,
            suffixes: (DEFAULT_SUFFIXES.0.to_owned(), DEFAULT_SUFFIXES.1.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JoinExecutionTrace {
    used_arena: bool,
    output_rows: usize,
    estimated_bytes: usize,
}

/// The result of a join plus, per output row, the source row in each input.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRelation {
    relation: Relation,
    left_positions: Vec<Option<usize>>,
    right_positions: Vec<Option<usize>>,
}

impl JoinedRelation {
    #[must_use]
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    #[must_use]
    pub fn into_relation(self) -> Relation {
        self.relation
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.relation.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relation.is_empty()
    }

    /// Row of the left input behind each output row; `None` when padded.
    #[must_use]
    pub fn left_positions(&self) -> &[Option<usize>] {
        &self.left_positions
    }

    #[must_use]
    pub fn right_positions(&self) -> &[Option<usize>] {
        &self.right_positions
    }

    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.slots()
            .filter(|(left, right)| left.is_some() && right.is_some())
            .count()
    }

    #[must_use]
    pub fn left_only_count(&self) -> usize {
        self.slots().filter(|(_, right)| right.is_none()).count()
    }

    #[must_use]
    pub fn right_only_count(&self) -> usize {
        self.slots().filter(|(left, _)| left.is_none()).count()
    }

    fn slots(&self) -> impl Iterator<Item = (Option<usize>, Option<usize>)> + '_ {
        self.left_positions
            .iter()
            .copied()
            .zip(self.right_positions.iter().copied())
    }
}

/// Evaluate `variant` over `left` and `right`, matching `left[left_on]`
/// against `right[right_on]`.
pub fn execute_join(
    left: &Relation,
    right: &Relation,
    left_on: &str,
    right_on: &str,
    variant: JoinVariant,
) -> Result<JoinedRelation, JoinError> {
    execute_join_with_options(left, right, left_on, right_on, variant, &JoinOptions::default())
}

pub fn execute_join_with_options(
    left: &Relation,
    right: &Relation,
    left_on: &str,
    right_on: &str,
    variant: JoinVariant,
    options: &JoinOptions,
) -> Result<JoinedRelation, JoinError> {
    let plan = variant.plan();
    let (joined, trace) = merge_with_trace(left, right, left_on, right_on, plan, options)?;
    debug!(
        variant = variant.name(),
        left_rows = left.len(),
        right_rows = right.len(),
        output_rows = joined.len(),
        estimated_rows = trace.output_rows,
        used_arena = trace.used_arena,
        estimated_bytes = trace.estimated_bytes,
        "join evaluated"
    );
    Ok(joined)
}

fn key_column<'a>(relation: &'a Relation, column: &str) -> Result<&'a Column, JoinError> {
    relation.column(column).ok_or_else(|| JoinError::InvalidKey {
        relation: relation.name().to_owned(),
        column: column.to_owned(),
        available: relation.column_names().to_vec(),
    })
}

/// Map each present key to the rows holding it, in row order. Missing keys
/// are left out, so they never match.
fn build_key_map(column: &Column) -> HashMap<JoinKey, Vec<usize>> {
    let mut map = HashMap::<JoinKey, Vec<usize>>::new();
    for (pos, value) in column.values().iter().enumerate() {
        if let Some(key) = value.join_key() {
            map.entry(key).or_default().push(pos);
        }
    }
    map
}

fn merge_with_trace(
    left: &Relation,
    right: &Relation,
    left_on: &str,
    right_on: &str,
    plan: JoinPlan,
    options: &JoinOptions,
) -> Result<(JoinedRelation, JoinExecutionTrace), JoinError> {
    let left_key = key_column(left, left_on)?;
    let right_key = key_column(right, right_on)?;

    // Right joins probe with the right relation so its row order leads.
    let (probe, build) = match plan.how {
        JoinType::Right => (right_key, left_key),
        JoinType::Inner | JoinType::Left | JoinType::Outer => (left_key, right_key),
    };
    let build_map = build_key_map(build);

    let output_rows = estimate_output_rows(probe, build.len(), &build_map, plan.how);
    let estimated_bytes = estimate_intermediate_bytes(output_rows);
    let use_arena = options.use_arena && estimated_bytes <= options.arena_budget_bytes;

    let (left_positions, right_positions) = if use_arena {
        let arena = Bump::new();
        let mut probe_slots = BumpVec::<Option<usize>>::with_capacity_in(output_rows, &arena);
        let mut build_slots = BumpVec::<Option<usize>>::with_capacity_in(output_rows, &arena);
        collect_positions(
            probe,
            build.len(),
            &build_map,
            plan.how,
            &mut probe_slots,
            &mut build_slots,
        );
        orient_and_filter(&probe_slots, &build_slots, plan)
    } else {
        let mut probe_slots = Vec::<Option<usize>>::with_capacity(output_rows);
        let mut build_slots = Vec::<Option<usize>>::with_capacity(output_rows);
        collect_positions(
            probe,
            build.len(),
            &build_map,
            plan.how,
            &mut probe_slots,
            &mut build_slots,
        );
        orient_and_filter(&probe_slots, &build_slots, plan)
    };

    let relation = assemble_output(
        left,
        right,
        left_on,
        right_on,
        &left_positions,
        &right_positions,
        options,
    )?;

    Ok((
        JoinedRelation {
            relation,
            left_positions,
            right_positions,
        },
        JoinExecutionTrace {
            used_arena: use_arena,
            output_rows,
            estimated_bytes,
        },
    ))
}

fn estimate_output_rows(
    probe: &Column,
    build_len: usize,
    build_map: &HashMap<JoinKey, Vec<usize>>,
    how: JoinType,
) -> usize {
    let probed: usize = probe
        .values()
        .iter()
        .map(|value| match value.join_key().and_then(|key| build_map.get(&key)) {
            Some(matches) => matches.len(),
            None if matches!(how, JoinType::Inner) => 0,
            None => 1,
        })
        .sum();
    // Outer joins may append every build row once more.
    if matches!(how, JoinType::Outer) {
        probed.saturating_add(build_len)
    } else {
        probed
    }
}

fn estimate_intermediate_bytes(output_rows: usize) -> usize {
    output_rows.saturating_mul(size_of::<Option<usize>>().saturating_mul(2))
}

/// Growable buffer of row slots, backed by the heap or by a bump arena.
trait SlotBuffer {
    fn push_slot(&mut self, slot: Option<usize>);
}

impl SlotBuffer for Vec<Option<usize>> {
    fn push_slot(&mut self, slot: Option<usize>) {
        self.push(slot);
    }
}

impl SlotBuffer for BumpVec<'_, Option<usize>> {
    fn push_slot(&mut self, slot: Option<usize>) {
        self.push(slot);
    }
}

/// Scan the probe side in row order, emitting one slot pair per match (build
/// rows in their own order) or a padded pair for unmatched probe rows when
/// the join keeps them. Outer joins then append unmatched build rows.
fn collect_positions<B: SlotBuffer>(
    probe: &Column,
    build_len: usize,
    build_map: &HashMap<JoinKey, Vec<usize>>,
    how: JoinType,
    probe_slots: &mut B,
    build_slots: &mut B,
) {
    let keep_unmatched_probe = !matches!(how, JoinType::Inner);
    let mut build_matched = vec![false; build_len];

    for (probe_pos, value) in probe.values().iter().enumerate() {
        if let Some(matches) = value.join_key().and_then(|key| build_map.get(&key)) {
            for build_pos in matches {
                probe_slots.push_slot(Some(probe_pos));
                build_slots.push_slot(Some(*build_pos));
                build_matched[*build_pos] = true;
            }
            continue;
        }

        if keep_unmatched_probe {
            probe_slots.push_slot(Some(probe_pos));
            build_slots.push_slot(None);
        }
    }

    if matches!(how, JoinType::Outer) {
        for (build_pos, matched) in build_matched.iter().enumerate() {
            if !matched {
                probe_slots.push_slot(None);
                build_slots.push_slot(Some(build_pos));
            }
        }
    }
}

/// Turn probe/build slots back into left/right slots and drop the rows the
/// plan filters out.
fn orient_and_filter(
    probe_slots: &[Option<usize>],
    build_slots: &[Option<usize>],
    plan: JoinPlan,
) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
    let (left_slots, right_slots) = match plan.how {
        JoinType::Right => (build_slots, probe_slots),
        JoinType::Inner | JoinType::Left | JoinType::Outer => (probe_slots, build_slots),
    };

    left_slots
        .iter()
        .zip(right_slots)
        .filter(|(left, right)| plan.keep.keeps(**left, **right))
        .map(|(left, right)| (*left, *right))
        .unzip()
}

/// Output names for each input column; `None` drops the column. A key shared
/// by name appears once. Other shared names get suffixes, and a suffixed name
/// that still clashes keeps growing until it is unique.
fn output_column_names(
    left: &Relation,
    right: &Relation,
    left_on: &str,
    right_on: &str,
    suffixes: &(String, String),
) -> (Vec<String>, Vec<Option<String>>) {
    let shared_key = left_on == right_on;
    let is_shared_key = |name: &str| shared_key && name == left_on;
    let clashes = |name: &str| !is_shared_key(name) && left.has_column(name) && right.has_column(name);

    let mut taken = left
        .column_names()
        .iter()
        .chain(right.column_names())
        .filter(|name| !clashes(name.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>();

    // An empty suffix leaves the bare name; further collisions fall back to
    // the default suffix for that side so the loop always advances.
    let mut disambiguate = |name: &str, suffix: &str, fallback: &str| {
        let mut candidate = format!("{name}{suffix}");
        let step = if suffix.is_empty() { fallback } else { suffix };
        while taken.contains(&candidate) {
            candidate.push_str(step);
        }
        taken.insert(candidate.clone());
        candidate
    };

    let left_names = left
        .column_names()
        .iter()
        .map(|name| {
            if clashes(name.as_str()) {
                disambiguate(name.as_str(), &suffixes.0, DEFAULT_SUFFIXES.0)
            } else {
                name.clone()
            }
        })
        .collect::<Vec<_>>();

    let right_names = right
        .column_names()
        .iter()
        .map(|name| {
            if is_shared_key(name.as_str()) {
                None
            } else if clashes(name.as_str()) {
                Some(disambiguate(name.as_str(), &suffixes.1, DEFAULT_SUFFIXES.1))
            } else {
                Some(name.clone())
            }
        })
        .collect::<Vec<_>>();

    (left_names, right_names)
}

fn assemble_output(
    left: &Relation,
    right: &Relation,
    left_on: &str,
    right_on: &str,
    left_positions: &[Option<usize>],
    right_positions: &[Option<usize>],
    options: &JoinOptions,
) -> Result<Relation, JoinError> {
    let (left_names, right_names) =
        output_column_names(left, right, left_on, right_on, &options.suffixes);
    let shared_key = left_on == right_on;

    let mut columns = Vec::with_capacity(left.width() + right.width());
    for ((name, column), out_name) in left.columns().zip(left_names) {
        let mut values = column.reindex_by_positions(left_positions)?;
        if shared_key && name == left_on {
            let right_key = key_column(right, right_on)?.reindex_by_positions(right_positions)?;
            values = values.coalesce(&right_key)?;
        }
        columns.push((out_name, values));
    }
    for ((_, column), out_name) in right.columns().zip(right_names) {
        if let Some(out_name) = out_name {
            columns.push((out_name, column.reindex_by_positions(right_positions)?));
        }
    }

    let name = format!("{}_{}", left.name(), right.name());
    Ok(Relation::with_row_count(
        name,
        left_positions.len(),
        columns,
    )?)
}
