use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Snapshot of the process environment seen by sessions and spawned commands.
///
/// The snapshot is taken once at startup; every spawned program receives these
/// variables, and `HOME` drives `cd` with no argument, prompt abbreviation and
/// the default history location. Tests build one by hand instead of mutating
/// the real process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: stdenv::vars().collect(),
        }
    }

    /// Get the value of an environment variable from the snapshot.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Set or override an environment variable in the snapshot.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The home directory, if `HOME` is set to something non-empty.
    pub fn home(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }

    /// Render `dir` with a leading home directory replaced by `~`.
    pub fn abbreviate_home(&self, dir: &Path) -> String {
        let shown = dir.to_string_lossy();
        match self.home() {
            Some(home) => {
                let home = home.to_string_lossy();
                match shown.strip_prefix(home.as_ref()) {
                    Some(rest) => format!("~{rest}"),
                    None => shown.into_owned(),
                }
            }
            None => shown.into_owned(),
        }
    }
}
