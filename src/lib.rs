//! A multi-session interactive command shell.
//!
//! Each [`Session`] owns a working directory, an output log, an editable
//! input line and its own command history. Accepted lines are parsed into a
//! [`Command`] and run as child processes whose merged output is appended to
//! the log. `multiWatch ["cmd", ...]` re-runs commands periodically and logs
//! their output whenever it changes.
//!
//! The [`Workspace`] holds the open sessions and is driven either by the
//! crossterm [`Terminal`] front-end or, for batch use, by
//! [`Workspace::run_headless`].

mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod editor;
pub mod env;
mod exec;
mod external;
pub mod history;
pub mod job;
mod lexer;
pub mod output;
pub mod parser;
pub mod session;
pub mod terminal;
pub mod watch;
pub mod workspace;

pub use command::Command;
pub use config::{Args, Config};
pub use env::Environment;
pub use session::{Event, Outcome, Session};
pub use terminal::Terminal;
pub use workspace::{Control, EventPump, Workspace};
