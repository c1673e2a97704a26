#![forbid(unsafe_code)]

//! Session, loading and presentation for the join explorer.
//!
//! A [`SessionState`] is rebuilt on every interaction and evaluated into a
//! [`JoinView`], which is rendered as text or JSON.

pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod render;
pub mod session;
pub mod view;

use std::io::{BufRead, Write};
use std::path::Path;

use jl_catalog::LEARNING_NOTES;
use tracing::warn;

pub use config::AppConfig;
pub use error::{AppError, ErrorKind};
pub use session::{COMMAND_HELP, Command, CustomQuery, Evaluation, SessionState};
pub use view::JoinView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn format_view(view: &JoinView, format: OutputFormat) -> Result<String, AppError> {
    match format {
        OutputFormat::Text => Ok(render::render_view(view)),
        OutputFormat::Json => render::render_json(view),
    }
}

fn print_evaluation<W: Write>(
    state: &SessionState,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), AppError> {
    match state.evaluate() {
        Ok(evaluation) => writeln!(out, "{}", format_view(&evaluation.view, format)?)?,
        Err(err) => report(out, &err)?,
    }
    Ok(())
}

fn report<W: Write>(out: &mut W, err: &AppError) -> Result<(), AppError> {
    warn!(kind = ?err.kind(), error = %err, "command failed");
    writeln!(out, "error: {err}")?;
    Ok(())
}

/// Read commands line by line until `quit` or end of input, printing a view
/// after every change. Failures are printed and the loop carries on; a
/// command that fails to apply leaves the state as it was.
pub fn run_interactive<R: BufRead, W: Write>(
    mut state: SessionState,
    input: R,
    out: &mut W,
    format: OutputFormat,
    export_dir: Option<&Path>,
) -> Result<SessionState, AppError> {
    print_evaluation(&state, format, out)?;
    writeln!(out, "type `help` for commands")?;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                report(out, &err)?;
                continue;
            }
        };

        match &command {
            Command::Quit => break,
            Command::Help => writeln!(out, "{COMMAND_HELP}")?,
            Command::Learn => writeln!(out, "{LEARNING_NOTES}")?,
            Command::Show => print_evaluation(&state, format, out)?,
            Command::Query(query) => writeln!(out, "Custom query:\n{}", query.sql())?,
            Command::Export(target) => {
                let target = target
                    .as_deref()
                    .or(export_dir)
                    .unwrap_or_else(|| Path::new("."));
                match state.evaluate().and_then(|evaluation| evaluation.export(target)) {
                    Ok(path) => writeln!(out, "wrote {}", path.display())?,
                    Err(err) => report(out, &err)?,
                }
            }
            _ => match state.clone().apply(&command) {
                Ok(next) => {
                    state = next;
                    print_evaluation(&state, format, out)?;
                }
                Err(err) => report(out, &err)?,
            },
        }
    }
    Ok(state)
}
