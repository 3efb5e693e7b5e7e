use crate::env::Environment;
use argh::FromArgs;
use std::path::PathBuf;
use std::time::Duration;

/// File name of the history log inside the home directory.
pub const HISTORY_FILE_NAME: &str = ".tabshell_history";

/// Environment variable that overrides the history location.
pub const HISTORY_ENV_VAR: &str = "TABSHELL_HISTORY";

#[derive(FromArgs, Debug)]
/// Interactive multi-session command shell.
pub struct Args {
    #[argh(switch)]
    /// read commands from standard input and dump the output log at end-of-input.
    pub headless: bool,

    #[argh(option)]
    /// path of the history file; defaults to $TABSHELL_HISTORY or ~/.tabshell_history.
    pub history_file: Option<PathBuf>,

    #[argh(switch)]
    /// keep history in memory only.
    pub no_history: bool,

    #[argh(option, default = "2000")]
    /// milliseconds a watched command sleeps between runs.
    pub watch_interval_ms: u64,

    #[argh(option, default = "1000")]
    /// milliseconds between capture file checks while watching.
    pub poll_interval_ms: u64,

    #[argh(option, default = "String::from(\"warn\")")]
    /// diagnostic level for stderr logging (error, warn, info, debug, trace).
    pub log_level: String,
}

/// Resolved runtime settings shared by every session of a workspace.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where accepted commands are persisted; `None` disables persistence.
    pub history_path: Option<PathBuf>,
    /// Pause between two runs of a watched command.
    pub watch_interval: Duration,
    /// How often capture files are checked for changes.
    pub poll_interval: Duration,
    /// Batch mode requested explicitly on the command line.
    pub headless: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_path: None,
            watch_interval: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(1000),
            headless: false,
        }
    }
}

impl Config {
    /// Combine command line flags with the environment.
    ///
    /// The history location is taken from `--history-file`, then
    /// `$TABSHELL_HISTORY`, then `$HOME/.tabshell_history`. Without any of
    /// them persistence is disabled.
    pub fn resolve(args: &Args, env: &Environment) -> Self {
        let history_path = if args.no_history {
            None
        } else {
            args.history_file
                .clone()
                .or_else(|| {
                    env.get_var(HISTORY_ENV_VAR)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                })
                .or_else(|| env.home().map(|home| home.join(HISTORY_FILE_NAME)))
        };
        Self {
            history_path,
            watch_interval: Duration::from_millis(args.watch_interval_ms),
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
            headless: args.headless,
        }
    }
}
