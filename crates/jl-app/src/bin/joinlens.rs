#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use jl_app::logging::init_tracing;
use jl_app::{
    AppConfig, AppError, CustomQuery, ErrorKind, OutputFormat, SessionState, format_view,
    run_interactive,
};
use jl_catalog::LEARNING_NOTES;
use jl_join::JoinVariant;
use tracing::info;

/// Explore how the seven JOIN variants combine two tables.
#[derive(Parser, Debug)]
#[command(name = "joinlens", version, about)]
struct Cli {
    /// JSON config file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the built-in Employees/Salaries tables
    #[arg(long, conflicts_with = "no_sample")]
    sample: bool,

    /// Require uploaded tables instead of the sample
    #[arg(long)]
    no_sample: bool,

    /// CSV file for table A (turns sample data off unless --sample is given)
    #[arg(long)]
    table_a: Option<PathBuf>,

    /// CSV file for table B
    #[arg(long)]
    table_b: Option<PathBuf>,

    /// Join key column of table A
    #[arg(long)]
    key_a: Option<String>,

    /// Join key column of table B
    #[arg(long)]
    key_b: Option<String>,

    /// Join variant: a label ("LEFT JOIN WITH NULL") or name (left_with_null)
    #[arg(long)]
    variant: Option<JoinVariant>,

    /// Suffixes for column names present in both tables
    #[arg(long, num_args = 2, value_names = ["LEFT", "RIGHT"], allow_hyphen_values = true)]
    suffixes: Option<Vec<String>>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Hide the input tables
    #[arg(long)]
    hide_tables: bool,

    /// Hide the join result
    #[arg(long)]
    hide_result: bool,

    /// Write the result as CSV; without a path the suggested name is used
    #[arg(long, num_args = 0..=1)]
    export: Option<Option<PathBuf>>,

    /// Read commands from stdin after the first view
    #[arg(long, short)]
    interactive: bool,

    /// Print notes on keys, NULLs and choosing a join
    #[arg(long)]
    learn: bool,

    /// Print hand-composed SQL: "<type> [on <cond>] [where <clause>]"
    #[arg(long, value_name = "QUERY")]
    query: Option<String>,

    /// Log at debug level regardless of RUST_LOG
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<AppConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        if self.table_a.is_some() || self.table_b.is_some() {
            config.use_sample = false;
        }
        if self.sample {
            config.use_sample = true;
        }
        if self.no_sample {
            config.use_sample = false;
        }
        if let Some(path) = &self.table_a {
            config.table_a = Some(path.clone());
        }
        if let Some(path) = &self.table_b {
            config.table_b = Some(path.clone());
        }
        if let Some(key) = &self.key_a {
            config.key_a = Some(key.clone());
        }
        if let Some(key) = &self.key_b {
            config.key_b = Some(key.clone());
        }
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some([left, right]) = self.suffixes.as_deref() {
            config.suffixes = (left.clone(), right.clone());
        }
        if self.hide_tables {
            config.show_tables = false;
        }
        if self.hide_result {
            config.show_result = false;
        }
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.resolve_config()?;
    let state = SessionState::from_config(&config)?;
    info!(
        sample = state.uses_sample(),
        variant = state.variant().name(),
        "session ready"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.learn {
        writeln!(out, "{LEARNING_NOTES}")?;
    }
    if let Some(query) = &cli.query {
        let query = query.parse::<CustomQuery>()?;
        writeln!(out, "Custom query:\n{}\n", query.sql())?;
    }

    if cli.interactive {
        let stdin = io::stdin();
        run_interactive(
            state,
            stdin.lock(),
            &mut out,
            cli.format,
            config.export_dir.as_deref(),
        )?;
        return Ok(());
    }

    let evaluation = state.evaluate()?;
    writeln!(out, "{}", format_view(&evaluation.view, cli.format)?)?;

    if let Some(target) = &cli.export {
        let target = target
            .as_deref()
            .or(config.export_dir.as_deref())
            .unwrap_or_else(|| Path::new("."));
        let path = evaluation.export(target)?;
        writeln!(out, "wrote {}", path.display())?;
    }
    Ok(())
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Usage | ErrorKind::Config => 2,
        ErrorKind::InvalidKey | ErrorKind::MalformedInput | ErrorKind::MissingInput => 3,
        ErrorKind::Io => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if err.kind() == ErrorKind::MissingInput {
                eprintln!("hint: pass --table-a and --table-b, or --sample");
            }
            ExitCode::from(exit_code(err.kind()))
        }
    }
}
