//! Command history: the in-memory list a session navigates and searches,
//! and the newline-delimited file it is persisted to.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Maximum number of entries kept in memory and on disk.
pub const HISTORY_LIMIT: usize = 10_000;

/// Shortest search string that may match as a substring.
const MIN_SUBSTRING_SEARCH: usize = 2;

/// Result of stepping through history with the recall keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recall {
    /// Nothing to step to; leave the input line alone.
    Unchanged,
    /// Show this entry.
    Entry(String),
    /// Stepped past the newest entry; show an empty line.
    Empty,
}

/// Hit of a reverse search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchHit {
    Exact(String),
    Substring(String),
}

/// Accepted commands of one session, oldest first.
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: VecDeque<String>,
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from previously persisted entries, keeping the newest ones.
    pub fn from_entries(entries: impl IntoIterator<Item = String>) -> Self {
        let mut entries: VecDeque<String> = entries.into_iter().collect();
        while entries.len() > HISTORY_LIMIT {
            entries.pop_front();
        }
        Self {
            entries,
            cursor: None,
        }
    }

    /// Record an accepted command.
    ///
    /// Returns `false` when the command repeats the newest entry and was
    /// therefore not recorded.
    pub fn push(&mut self, entry: impl Into<String>) -> bool {
        let entry = entry.into();
        if self.entries.back() == Some(&entry) {
            return false;
        }
        self.entries.push_back(entry);
        if self.entries.len() > HISTORY_LIMIT {
            self.entries.pop_front();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Position of the recall cursor, `None` when not navigating.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    /// Step towards older entries, stopping at the oldest.
    pub fn older(&mut self) -> Recall {
        if self.entries.is_empty() {
            return Recall::Unchanged;
        }
        let idx = match self.cursor {
            None => self.entries.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.cursor = Some(idx);
        Recall::Entry(self.entries[idx].clone())
    }

    /// Step towards newer entries; past the newest the line is emptied.
    pub fn newer(&mut self) -> Recall {
        match self.cursor {
            None => Recall::Unchanged,
            Some(i) if i + 1 < self.entries.len() => {
                self.cursor = Some(i + 1);
                Recall::Entry(self.entries[i + 1].clone())
            }
            Some(_) => {
                self.cursor = None;
                Recall::Empty
            }
        }
    }

    /// Reverse search from the newest entry.
    ///
    /// An exact match anywhere wins over a substring match; substring
    /// matching is only tried for terms of two or more characters.
    pub fn search(&self, term: &str) -> Option<SearchHit> {
        if let Some(hit) = self.entries.iter().rev().find(|e| e.as_str() == term) {
            return Some(SearchHit::Exact(hit.clone()));
        }
        if term.chars().count() < MIN_SUBSTRING_SEARCH {
            return None;
        }
        self.entries
            .iter()
            .rev()
            .find(|e| e.contains(term))
            .map(|hit| SearchHit::Substring(hit.clone()))
    }
}

/// Newline-delimited history file; one command per line, oldest first.
///
/// A store without a path is a no-op: loading yields nothing and appending
/// succeeds without touching the filesystem.
#[derive(Debug, Default, Clone)]
pub struct HistoryStore {
    path: Option<PathBuf>,
}

impl HistoryStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read persisted entries, skipping blank lines and keeping the newest
    /// [`HISTORY_LIMIT`].
    pub fn load(&self) -> Result<Vec<String>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "history file not found, will create it");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("can't read history file {}", path.display()));
            }
        };
        let mut entries: Vec<String> = text
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if entries.len() > HISTORY_LIMIT {
            entries.drain(..entries.len() - HISTORY_LIMIT);
        }
        debug!(path = %path.display(), count = entries.len(), "history loaded");
        Ok(entries)
    }

    /// Append one entry.
    ///
    /// When the file already holds [`HISTORY_LIMIT`] lines it is rewritten
    /// with only the newest `HISTORY_LIMIT - 1` before appending.
    pub fn append(&self, entry: &str) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        match fs::read_to_string(path) {
            Ok(text) => {
                let lines: Vec<&str> = text.lines().collect();
                if lines.len() >= HISTORY_LIMIT {
                    let keep = &lines[lines.len() - (HISTORY_LIMIT - 1)..];
                    let mut compacted = keep.join("\n");
                    compacted.push('\n');
                    fs::write(path, compacted)
                        .with_context(|| format!("can't compact history file {}", path.display()))?;
                    debug!(path = %path.display(), "history file compacted");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("can't read history file {}", path.display()));
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("can't open history file {} for writing", path.display()))?;
        writeln!(file, "{entry}")
            .with_context(|| format!("can't write history file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn history_of(entries: &[&str]) -> History {
        let mut h = History::new();
        for e in entries {
            h.push(*e);
        }
        h
    }

    #[test]
    fn adjacent_duplicates_are_suppressed() {
        let mut h = History::new();
        assert!(h.push("ls"));
        assert!(!h.push("ls"));
        assert!(h.push("pwd"));
        assert!(h.push("ls"));
        assert_eq!(h.entries().collect::<Vec<_>>(), ["ls", "pwd", "ls"]);
    }

    #[test]
    fn limit_evicts_oldest() {
        let mut h = History::new();
        for i in 0..=HISTORY_LIMIT {
            h.push(format!("cmd {i}"));
        }
        assert_eq!(h.len(), HISTORY_LIMIT);
        assert_eq!(h.entries().next(), Some("cmd 1"));
        assert_eq!(h.entries().last(), Some(format!("cmd {HISTORY_LIMIT}").as_str()));
    }

    #[test]
    fn recall_clamps_at_oldest_and_empties_past_newest() {
        let mut h = history_of(&["a", "b", "c"]);
        assert_eq!(h.newer(), Recall::Unchanged);
        assert_eq!(h.older(), Recall::Entry("c".into()));
        assert_eq!(h.older(), Recall::Entry("b".into()));
        assert_eq!(h.older(), Recall::Entry("a".into()));
        assert_eq!(h.older(), Recall::Entry("a".into()));
        assert_eq!(h.newer(), Recall::Entry("b".into()));
        assert_eq!(h.newer(), Recall::Entry("c".into()));
        assert_eq!(h.newer(), Recall::Empty);
        assert_eq!(h.cursor(), None);
    }

    #[test]
    fn recall_on_empty_history_is_noop() {
        let mut h = History::new();
        assert_eq!(h.older(), Recall::Unchanged);
        assert_eq!(h.newer(), Recall::Unchanged);
    }

    #[test]
    fn exact_match_beats_more_recent_substring_match() {
        let h = history_of(&["git", "git status", "git log"]);
        assert_eq!(h.search("git"), Some(SearchHit::Exact("git".into())));
    }

    #[test]
    fn substring_match_prefers_most_recent() {
        let h = history_of(&["cargo build", "ls", "cargo test"]);
        assert_eq!(
            h.search("cargo"),
            Some(SearchHit::Substring("cargo test".into()))
        );
    }

    #[test]
    fn single_char_term_only_matches_exactly() {
        let h = history_of(&["ls", "l"]);
        assert_eq!(h.search("s"), None);
        assert_eq!(h.search("l"), Some(SearchHit::Exact("l".into())));
    }

    #[test]
    fn store_round_trips_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        fs::write(&path, "ls\n\npwd\n").unwrap();
        let store = HistoryStore::new(Some(path.clone()));

        store.append("date").unwrap();

        assert_eq!(store.load().unwrap(), ["ls", "pwd", "date"]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "ls\n\npwd\ndate\n");
    }

    #[test]
    fn missing_file_loads_empty_and_is_created_on_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        let store = HistoryStore::new(Some(path.clone()));

        assert!(store.load().unwrap().is_empty());
        store.append("echo hi").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo hi\n");
    }

    #[test]
    fn load_keeps_newest_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        let text: String = (0..HISTORY_LIMIT + 5).map(|i| format!("c{i}\n")).collect();
        fs::write(&path, text).unwrap();

        let entries = HistoryStore::new(Some(path)).load().unwrap();

        assert_eq!(entries.len(), HISTORY_LIMIT);
        assert_eq!(entries[0], "c5");
    }

    #[test]
    fn append_compacts_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        let text: String = (0..HISTORY_LIMIT).map(|i| format!("c{i}\n")).collect();
        fs::write(&path, text).unwrap();
        let store = HistoryStore::new(Some(path.clone()));

        store.append("newest").unwrap();

        let on_disk = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = on_disk.lines().collect();
        assert_eq!(lines.len(), HISTORY_LIMIT);
        assert_eq!(lines[0], "c1");
        assert_eq!(lines[HISTORY_LIMIT - 1], "newest");
    }

    #[test]
    fn disabled_store_is_noop() {
        let store = HistoryStore::disabled();
        assert!(store.load().unwrap().is_empty());
        store.append("anything").unwrap();
        assert_eq!(store.path(), None);
    }
}
