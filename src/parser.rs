use crate::builtin::{self, BuiltinCommand, Cd, ShowHistory};
use crate::command::{Command, Pipeline, SimpleCommand, Stage};
use crate::lexer::{split_redirects, split_stages, split_words, watch_list};
use argh::EarlyExit;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while classifying a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing but whitespace was given.
    #[error("empty command")]
    Empty,
    /// A redirection without a program in front of it.
    #[error("syntax error: missing command")]
    MissingCommand,
    /// Two adjacent `|`, or a `|` at either end of the line.
    #[error("syntax error: empty pipeline stage")]
    EmptyStage,
    /// `<` or `>` with nothing after it.
    #[error("syntax error: missing file after `{0}`")]
    MissingRedirectTarget(char),
    /// `multiWatch` without a bracketed list.
    #[error("multiWatch syntax: multiWatch [\"cmd1\", \"cmd2\"]")]
    WatchSyntax,
}

/// Classify one input line.
///
/// Builtins are recognized first, then `multiWatch`, then pipelines; all
/// remaining lines are a single program with optional redirections whose
/// targets are resolved against `cwd`.
///
/// A line starting with `multiWatch` is a watch even when it contains `|`,
/// so watched commands may themselves be pipelines inside the list.
pub fn parse(line: &str, cwd: &Path) -> Result<Command, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    match line {
        "clear" => return Ok(Command::Clear),
        "exit" => return Ok(Command::Exit),
        "close" => return Ok(Command::Close),
        _ => {}
    }

    let words = split_words(line);
    let args: Vec<&str> = words.iter().skip(1).map(String::as_str).collect();
    match words[0].as_str() {
        name if name == ShowHistory::name() => {
            return Ok(builtin_command(&args, Command::History));
        }
        name if name == Cd::name() => return Ok(builtin_command(&args, Command::Cd)),
        _ => {}
    }

    if line.starts_with("multiWatch") {
        return watch_list(line)
            .map(Command::Watch)
            .ok_or(ParseError::WatchSyntax);
    }

    let stages = split_stages(line);
    if stages.len() > 1 {
        return parse_pipeline(stages);
    }

    parse_simple(&stages[0], cwd)
}

fn builtin_command<T: BuiltinCommand>(args: &[&str], wrap: fn(T) -> Command) -> Command {
    match builtin::parse_args::<T>(args) {
        Ok(cmd) => wrap(cmd),
        Err(EarlyExit { output, status }) => Command::Usage {
            output,
            is_error: status.is_err(),
        },
    }
}

fn parse_pipeline(stages: Vec<String>) -> Result<Command, ParseError> {
    let stages = stages
        .into_iter()
        .map(|stage| Stage::from_words(split_words(&stage)).ok_or(ParseError::EmptyStage))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Command::Pipeline(Pipeline { stages }))
}

fn parse_simple(text: &str, cwd: &Path) -> Result<Command, ParseError> {
    let redirects = split_redirects(text);
    let stage = Stage::from_words(split_words(redirects.command)).ok_or(ParseError::MissingCommand)?;
    Ok(Command::Simple(SimpleCommand {
        stage,
        input: redirect_target(redirects.input, '<', cwd)?,
        output: redirect_target(redirects.output, '>', cwd)?,
    }))
}

fn redirect_target(
    target: Option<&str>,
    marker: char,
    cwd: &Path,
) -> Result<Option<PathBuf>, ParseError> {
    match target {
        None => Ok(None),
        Some("") => Err(ParseError::MissingRedirectTarget(marker)),
        Some(path) => Ok(Some(cwd.join(path))),
    }
}
