use crate::command::ExitCode;
use crate::env::Environment;
use crate::history::History;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Number of entries `history` prints when no count is given.
pub const DEFAULT_HISTORY_LISTING: usize = 1000;

/// Session state a builtin may read or change.
pub(crate) struct BuiltinContext<'a> {
    pub cwd: &'a mut PathBuf,
    pub history: &'a History,
    pub env: &'a Environment,
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Executes the command, writing anything user-visible to `out`.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, out: &mut dyn Write, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode>;
}

/// Parse builtin arguments; `EarlyExit` carries help or error text.
pub(crate) fn parse_args<T: BuiltinCommand>(args: &[&str]) -> Result<T, EarlyExit> {
    T::from_args(&[T::name()], args)
}

/// Execute a builtin, rendering a failure into the same output stream.
pub(crate) fn run<T: BuiltinCommand>(
    cmd: T,
    out: &mut dyn Write,
    ctx: &mut BuiltinContext<'_>,
) -> Result<ExitCode> {
    match cmd.execute(out, ctx) {
        Ok(x) => Ok(x),
        Err(e) => {
            writeln!(out, "{e:#}")?;
            Ok(1)
        }
    }
}

#[derive(FromArgs, Debug, Clone, PartialEq, Eq)]
/// Change the working directory of the current session.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _out: &mut dyn Write, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
        let arg = match self.target.join(" ") {
            t if t.is_empty() => ctx
                .env
                .home()
                .map(|home| home.to_string_lossy().into_owned())
                .unwrap_or_else(|| "/".to_string()),
            t => t,
        };

        let candidate = if arg == ".." {
            ctx.cwd
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| ctx.cwd.clone())
        } else {
            ctx.cwd.join(&arg)
        };

        if !candidate.is_dir() {
            return Err(anyhow!("cd: no such directory: {arg}"));
        }

        let absolute = std::path::absolute(&candidate)
            .with_context(|| format!("cd error: {}", candidate.display()))?;
        *ctx.cwd = normalize(&absolute);
        Ok(0)
    }
}

/// Drop `.` and let `..` remove the component before it, without
/// following symlinks, so the directory keeps the name it was entered by.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[derive(FromArgs, Debug, Clone, PartialEq, Eq)]
/// List previously accepted commands, oldest first.
pub struct ShowHistory {
    #[argh(option, short = 'n', default = "DEFAULT_HISTORY_LISTING")]
    /// how many of the most recent entries to show.
    pub count: usize,
}

impl BuiltinCommand for ShowHistory {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, out: &mut dyn Write, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
        let total = ctx.history.len();
        let start = total.saturating_sub(self.count);
        for (i, entry) in ctx.history.entries().enumerate().skip(start) {
            writeln!(out, "{}  {}", i + 1, entry)?;
        }
        Ok(0)
    }
}
