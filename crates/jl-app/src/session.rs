use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use jl_catalog::{DEFAULT_QUERY_CONDITION, QueryJoin, render_custom_sql};
use jl_frame::Relation;
use jl_io::write_csv_path;
use jl_join::{JoinOptions, JoinVariant, JoinedRelation, execute_join_with_options};
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::loader::{TableSide, default_key, load_table, sample_relations};
use crate::view::{JoinView, ViewInputs};

/// Everything one evaluation depends on. Never mutated in place: each
/// interaction produces a new state and the view is recomputed from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    use_sample: bool,
    sample: (Arc<Relation>, Arc<Relation>),
    uploaded_a: Option<Arc<Relation>>,
    uploaded_b: Option<Arc<Relation>>,
    key_a: Option<String>,
    key_b: Option<String>,
    variant: JoinVariant,
    show_tables: bool,
    show_result: bool,
    table_a_name: String,
    table_b_name: String,
    options: JoinOptions,
}

/// Relations and keys after sample/upload resolution.
#[derive(Debug, Clone)]
pub struct ResolvedInputs {
    pub table_a: Arc<Relation>,
    pub table_b: Arc<Relation>,
    pub key_a: String,
    pub key_b: String,
}

/// A computed view together with the result it was built from.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub view: JoinView,
    pub result: JoinedRelation,
}

impl Evaluation {
    /// Write the result as CSV. A directory target receives the suggested
    /// file name for the variant.
    pub fn export(&self, target: &Path) -> Result<PathBuf, AppError> {
        let path = if target.is_dir() {
            target.join(&self.view.export_file_name)
        } else {
            target.to_path_buf()
        };
        write_csv_path(self.result.relation(), &path).map_err(|source| AppError::Export {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), rows = self.result.len(), "exported join result");
        Ok(path)
    }
}

impl SessionState {
    /// Build the initial state, reading any table paths the config names.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let (employees, salaries) = sample_relations()?;
        let uploaded_a = config
            .table_a
            .as_deref()
            .map(load_table)
            .transpose()?
            .map(Arc::new);
        let uploaded_b = config
            .table_b
            .as_deref()
            .map(load_table)
            .transpose()?
            .map(Arc::new);

        Ok(Self {
            use_sample: config.use_sample,
            sample: (Arc::new(employees), Arc::new(salaries)),
            uploaded_a,
            uploaded_b,
            key_a: config.key_a.clone(),
            key_b: config.key_b.clone(),
            variant: config.variant,
            show_tables: config.show_tables,
            show_result: config.show_result,
            table_a_name: config.table_a_name.clone(),
            table_b_name: config.table_b_name.clone(),
            options: config.join_options(),
        })
    }

    #[must_use]
    pub fn variant(&self) -> JoinVariant {
        self.variant
    }

    #[must_use]
    pub fn uses_sample(&self) -> bool {
        self.use_sample
    }

    #[must_use]
    pub fn shows_tables(&self) -> bool {
        self.show_tables
    }

    #[must_use]
    pub fn shows_result(&self) -> bool {
        self.show_result
    }

    #[must_use]
    pub fn with_variant(self, variant: JoinVariant) -> Self {
        Self { variant, ..self }
    }

    #[must_use]
    pub fn with_key(self, side: TableSide, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match side {
            TableSide::A => Self { key_a: key, ..self },
            TableSide::B => Self { key_b: key, ..self },
        }
    }

    /// Replace one side's uploaded table. The side's key falls back to the
    /// new table's default.
    #[must_use]
    pub fn with_table(self, side: TableSide, relation: Relation) -> Self {
        let relation = Some(Arc::new(relation));
        match side {
            TableSide::A => Self {
                uploaded_a: relation,
                key_a: None,
                ..self
            },
            TableSide::B => Self {
                uploaded_b: relation,
                key_b: None,
                ..self
            },
        }
    }

    #[must_use]
    pub fn with_sample(self, use_sample: bool) -> Self {
        Self { use_sample, ..self }
    }

    #[must_use]
    pub fn with_show_tables(self, show_tables: bool) -> Self {
        Self {
            show_tables,
            ..self
        }
    }

    #[must_use]
    pub fn with_show_result(self, show_result: bool) -> Self {
        Self {
            show_result,
            ..self
        }
    }

    pub fn resolve_inputs(&self) -> Result<ResolvedInputs, AppError> {
        let (table_a, table_b) = if self.use_sample {
            (Arc::clone(&self.sample.0), Arc::clone(&self.sample.1))
        } else {
            match (&self.uploaded_a, &self.uploaded_b) {
                (Some(a), Some(b)) => (Arc::clone(a), Arc::clone(b)),
                (a, b) => {
                    let sides = [(TableSide::A, a.is_none()), (TableSide::B, b.is_none())]
                        .into_iter()
                        .filter(|(_, missing)| *missing)
                        .map(|(side, _)| side.to_string())
                        .collect::<Vec<_>>()
                        .join(" and ");
                    return Err(AppError::MissingInput { sides });
                }
            }
        };

        let key_a = self
            .key_a
            .clone()
            .unwrap_or_else(|| default_key(&table_a, self.use_sample));
        let key_b = self
            .key_b
            .clone()
            .unwrap_or_else(|| default_key(&table_b, self.use_sample));

        Ok(ResolvedInputs {
            table_a,
            table_b,
            key_a,
            key_b,
        })
    }

    /// Run the selected join over the current inputs and build its view.
    pub fn evaluate(&self) -> Result<Evaluation, AppError> {
        let inputs = self.resolve_inputs()?;
        let result = execute_join_with_options(
            &inputs.table_a,
            &inputs.table_b,
            &inputs.key_a,
            &inputs.key_b,
            self.variant,
            &self.options,
        )?;
        info!(
            variant = self.variant.name(),
            key_a = %inputs.key_a,
            key_b = %inputs.key_b,
            rows = result.len(),
            "recomputed join view"
        );

        let view = JoinView::build(
            &ViewInputs {
                variant: self.variant,
                table_a: &inputs.table_a,
                table_b: &inputs.table_b,
                key_a: &inputs.key_a,
                key_b: &inputs.key_b,
                table_a_name: &self.table_a_name,
                table_b_name: &self.table_b_name,
                show_tables: self.show_tables,
                show_result: self.show_result,
            },
            &result,
        );
        Ok(Evaluation { view, result })
    }

    /// Apply a state-changing command. Commands without state effect return
    /// the state unchanged.
    pub fn apply(self, command: &Command) -> Result<Self, AppError> {
        Ok(match command {
            Command::Variant(variant) => self.with_variant(*variant),
            Command::Key(side, key) => self.with_key(*side, key.clone()),
            Command::Load(side, path) => {
                let relation = load_table(path)?;
                self.with_table(*side, relation).with_sample(false)
            }
            Command::Sample(on) => self.with_sample(*on),
            Command::Tables(on) => self.with_show_tables(*on),
            Command::Result(on) => self.with_show_result(*on),
            Command::Query(_)
            | Command::Export(_)
            | Command::Show
            | Command::Learn
            | Command::Help
            | Command::Quit => self,
        })
    }
}

/// One line of the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Variant(JoinVariant),
    Key(TableSide, String),
    Load(TableSide, PathBuf),
    Sample(bool),
    Tables(bool),
    Result(bool),
    Export(Option<PathBuf>),
    Query(CustomQuery),
    Show,
    Learn,
    Help,
    Quit,
}

pub const COMMAND_HELP: &str = "\
commands:
  variant <name>     select a join, e.g. `variant left with null`
  key-a <column>     join key of table A
  key-b <column>     join key of table B
  load-a <path>      load table A from CSV (turns sample data off)
  load-b <path>      load table B from CSV (turns sample data off)
  sample on|off      use the built-in Employees/Salaries tables
  tables on|off      show the input tables
  result on|off      show the join result
  export [path]      write the result as CSV
  query <type> [on <cond>] [where <clause>]
                     compose SQL by hand (inner, left, right or full); never run
  show               print the current view
  learn              print notes on keys, NULLs and choosing a join
  help               print this list
  quit               leave the session";

/// A hand-written statement for the query builder. The condition and
/// clause are kept as typed and only ever pasted into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomQuery {
    pub join: QueryJoin,
    pub condition: String,
    pub where_clause: Option<String>,
}

impl CustomQuery {
    #[must_use]
    pub fn sql(&self) -> String {
        render_custom_sql(self.join, &self.condition, self.where_clause.as_deref())
    }
}

/// Split at the first whitespace-delimited occurrence of `keyword`, ignoring
/// ASCII case.
fn split_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let lower = text.to_ascii_lowercase();
    let mut from = 0;
    while let Some(found) = lower[from..].find(keyword) {
        let start = from + found;
        let end = start + keyword.len();
        let starts_word = lower[..start].chars().next_back().is_none_or(char::is_whitespace);
        let ends_word = lower[end..].chars().next().is_none_or(char::is_whitespace);
        if starts_word && ends_word {
            return Some((text[..start].trim(), text[end..].trim()));
        }
        from = end;
    }
    None
}

/// `<type> [on <condition>] [where <clause>]`. Without `on` the sample key
/// condition is used; the first standalone `where` after it opens the clause.
impl FromStr for CustomQuery {
    type Err = AppError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (join, condition, where_clause) = match split_keyword(text, "on") {
            Some((join, rest)) => match split_keyword(rest, "where") {
                Some((condition, clause)) => (join, condition, Some(clause)),
                None => (join, rest, None),
            },
            None => (text, DEFAULT_QUERY_CONDITION, None),
        };
        if condition.is_empty() {
            return Err(AppError::Usage("`query ... on` needs a join condition".to_owned()));
        }
        let join = join
            .parse::<QueryJoin>()
            .map_err(|err| AppError::Usage(err.to_string()))?;
        Ok(Self {
            join,
            condition: condition.to_owned(),
            where_clause: where_clause
                .filter(|clause| !clause.is_empty())
                .map(str::to_owned),
        })
    }
}

fn parse_switch(word: &str, arg: &str) -> Result<bool, AppError> {
    match arg.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(AppError::Usage(format!("`{word}` expects on or off"))),
    }
}

fn require_arg<'a>(word: &str, arg: &'a str) -> Result<&'a str, AppError> {
    if arg.is_empty() {
        Err(AppError::Usage(format!("`{word}` needs an argument")))
    } else {
        Ok(arg)
    }
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        match word.to_ascii_lowercase().as_str() {
            "variant" | "join" => Ok(Self::Variant(require_arg(word, arg)?.parse()?)),
            "key-a" => Ok(Self::Key(TableSide::A, require_arg(word, arg)?.to_owned())),
            "key-b" => Ok(Self::Key(TableSide::B, require_arg(word, arg)?.to_owned())),
            "load-a" => Ok(Self::Load(TableSide::A, require_arg(word, arg)?.into())),
            "load-b" => Ok(Self::Load(TableSide::B, require_arg(word, arg)?.into())),
            "sample" => Ok(Self::Sample(parse_switch(word, arg)?)),
            "tables" => Ok(Self::Tables(parse_switch(word, arg)?)),
            "result" => Ok(Self::Result(parse_switch(word, arg)?)),
            "export" => Ok(Self::Export((!arg.is_empty()).then(|| PathBuf::from(arg)))),
            "query" => Ok(Self::Query(require_arg(word, arg)?.parse()?)),
            "show" => Ok(Self::Show),
            "learn" => Ok(Self::Learn),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            _ => Err(AppError::Usage(format!(
                "unknown command `{word}` (type `help` for a list)"
            ))),
        }
    }
}
