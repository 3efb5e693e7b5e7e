use crate::builtin::{Cd, ShowHistory};
use std::path::PathBuf;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Processes killed by a signal report `128 + signal`.
pub type ExitCode = i32;

/// One program invocation inside a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub program: String,
    pub args: Vec<String>,
}

impl Stage {
    /// Build a stage from already split words; `None` for an empty word list.
    pub fn from_words(mut words: Vec<String>) -> Option<Self> {
        if words.is_empty() {
            return None;
        }
        let program = words.remove(0);
        Some(Self {
            program,
            args: words,
        })
    }
}

/// A single command with optional redirections, resolved against the
/// session's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand {
    pub stage: Stage,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Two or more stages connected stdout-to-stdin. Redirection markers inside
/// a pipeline are plain argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

/// Every kind of line a session knows how to run.
///
/// Lines are classified once by the parser; callers branch on the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Empty the output log.
    Clear,
    /// Terminate the program.
    Exit,
    /// Close the current session.
    Close,
    /// List history entries.
    History(ShowHistory),
    /// Change the working directory.
    Cd(Cd),
    /// Start monitoring the given command strings.
    Watch(Vec<String>),
    /// Run connected stages.
    Pipeline(Pipeline),
    /// Run one program.
    Simple(SimpleCommand),
    /// Builtin argument parsing stopped early (help text or bad flags).
    Usage { output: String, is_error: bool },
}

impl Command {
    /// Number of program stages this command will spawn.
    pub fn stage_count(&self) -> usize {
        match self {
            Command::Pipeline(p) => p.stages.len(),
            Command::Simple(_) => 1,
            _ => 0,
        }
    }
}
