//! One shell context: working directory, output log, input line, history,
//! and the editing mode that decides what incoming edit events mean.

use crate::builtin::{self, BuiltinCommand, BuiltinContext};
use crate::command::Command;
use crate::completion::{self, Completion, CompletionState};
use crate::editor::{LineBuffer, Mode};
use crate::env::Environment;
use crate::exec::{JobEnd, Orchestrator};
use crate::history::{History, HistoryStore, Recall, SearchHit};
use crate::job::{JobSignal, JobSlot};
use crate::output::OutputLog;
use crate::parser::{self, ParseError};
use crate::watch::{WatchCancel, WatchSet, WatchSettings};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SEARCH_PROMPT: &str = "(reverse-i-search): ";

/// Discrete edit operations delivered by a front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Insert(char),
    Paste(String),
    CursorLeft,
    CursorRight,
    CursorHome,
    CursorEnd,
    Backspace,
    AcceptLine,
    Cancel,
    Interrupt,
    Stop,
    HistoryOlder,
    HistoryNewer,
    ReverseSearch,
    Complete,
    /// Lines to scroll; positive values move towards older output.
    Scroll(isize),
    SwitchSession(usize),
    NextSession,
    NewSession,
    CloseSession,
}

/// What the owner of a session has to do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// Terminate the program.
    Exit,
    /// Close this session.
    Close,
    /// Start watching these command strings on behalf of this session.
    Watch(Vec<String>),
}

pub struct Session {
    id: usize,
    cwd: PathBuf,
    log: OutputLog,
    input: LineBuffer,
    history: History,
    mode: Mode,
    job: JobSlot,
    env: Environment,
    store: HistoryStore,
    watch: Option<WatchCancel>,
}

impl Session {
    /// Create a session and seed its history from `store`.
    ///
    /// A history file that cannot be read leaves the session with an empty
    /// history; persistence stays enabled.
    pub fn new(id: usize, cwd: PathBuf, env: Environment, store: HistoryStore) -> Self {
        let entries = store.load().unwrap_or_else(|e| {
            warn!(session = id, "failed to load history: {e:#}");
            Vec::new()
        });
        Self {
            id,
            cwd,
            log: OutputLog::new(),
            input: LineBuffer::new(),
            history: History::from_entries(entries),
            mode: Mode::Normal,
            job: JobSlot::new(),
            env,
            store,
            watch: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn log(&self) -> &OutputLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut OutputLog {
        &mut self.log
    }

    pub fn input(&self) -> &LineBuffer {
        &self.input
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn job(&self) -> &JobSlot {
        &self.job
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// `tabshell:<dir>$ ` with the home directory shown as `~`.
    pub fn prompt(&self) -> String {
        format!("tabshell:{}$ ", self.env.abbreviate_home(&self.cwd))
    }

    /// Apply one edit event.
    ///
    /// Session switching events belong to the workspace and are ignored.
    pub fn handle(&mut self, event: Event) -> Outcome {
        match event {
            Event::Interrupt => {
                self.interrupt();
                return Outcome::Continue;
            }
            Event::Stop => {
                self.stop();
                return Outcome::Continue;
            }
            Event::Scroll(delta) => {
                self.log.scroll_by(delta);
                return Outcome::Continue;
            }
            _ => {}
        }

        match self.mode {
            Mode::Normal => self.handle_normal(event),
            Mode::Searching(_) => {
                self.handle_search(event);
                Outcome::Continue
            }
            Mode::Selecting(_) => {
                self.handle_selection(event);
                Outcome::Continue
            }
        }
    }

    fn handle_normal(&mut self, event: Event) -> Outcome {
        match event {
            Event::Insert(c) => self.input.insert_char(c),
            Event::Paste(text) => self.input.insert_str(&text),
            Event::CursorLeft => self.input.left(),
            Event::CursorRight => self.input.right(),
            Event::CursorHome => self.input.home(),
            Event::CursorEnd => self.input.end(),
            Event::Backspace => {
                self.input.backspace();
            }
            Event::AcceptLine => return self.accept_line(),
            Event::HistoryOlder => {
                let recall = self.history.older();
                self.recall(recall);
            }
            Event::HistoryNewer => {
                let recall = self.history.newer();
                self.recall(recall);
            }
            Event::ReverseSearch => {
                self.log.push(SEARCH_PROMPT);
                self.log.follow_tail();
                self.mode = Mode::Searching(LineBuffer::new());
            }
            Event::Complete => self.complete(),
            _ => {}
        }
        Outcome::Continue
    }

    fn recall(&mut self, recall: Recall) {
        match recall {
            Recall::Unchanged => {}
            Recall::Entry(entry) => self.input.set(entry),
            Recall::Empty => self.input.clear(),
        }
    }

    fn handle_search(&mut self, event: Event) {
        let Mode::Searching(term) = &mut self.mode else {
            return;
        };
        match event {
            Event::Insert(c) => term.insert_char(c),
            Event::Paste(text) => term.insert_str(&text),
            Event::Backspace => {
                term.backspace();
            }
            Event::CursorLeft => term.left(),
            Event::CursorRight => term.right(),
            Event::CursorHome => term.home(),
            Event::CursorEnd => term.end(),
            Event::AcceptLine => {
                let term = term.take();
                self.mode = Mode::Normal;
                self.finish_search(&term);
                return;
            }
            Event::Cancel => {
                self.mode = Mode::Normal;
                self.log.push("Search cancelled");
                return;
            }
            _ => return,
        }
        let line = format!("{SEARCH_PROMPT}{}", term.as_str());
        self.log.replace_last(line);
    }

    fn finish_search(&mut self, term: &str) {
        if term.is_empty() {
            self.log.push("Search cancelled");
            return;
        }
        match self.history.search(term) {
            Some(SearchHit::Exact(entry)) => {
                self.log.push(format!("Found: {entry}"));
                self.input.set(entry);
            }
            Some(SearchHit::Substring(entry)) => {
                self.log.push(format!("Match: {entry}"));
                self.input.set(entry);
            }
            None => {
                self.log.push("No match found in history");
                self.input.clear();
            }
        }
        self.log.follow_tail();
    }

    fn handle_selection(&mut self, event: Event) {
        let Mode::Selecting(state) = &self.mode else {
            return;
        };
        match event {
            Event::Insert(c @ '1'..='9') => {
                let choice = c as usize - '0' as usize;
                match state.select(self.input.as_str(), choice) {
                    Some((line, picked)) => {
                        self.log.push(format!("Selected: {picked}"));
                        self.input.set(line);
                        self.mode = Mode::Normal;
                    }
                    None => {
                        let count = state.candidates.len();
                        self.log.push(format!(
                            "Invalid selection. Please enter a number between 1 and {count}"
                        ));
                    }
                }
            }
            Event::Cancel => {
                self.mode = Mode::Normal;
                self.log.push("Selection cancelled");
            }
            Event::AcceptLine => {
                self.log
                    .push("Please enter a number to select a file, or press Esc to cancel");
            }
            _ => {}
        }
    }

    fn complete(&mut self) {
        match completion::complete(self.input.as_str(), &self.cwd) {
            Ok(Completion::Unchanged) => {}
            Ok(Completion::Replaced(line)) => self.input.set(line),
            Ok(Completion::Ambiguous(state)) => self.enter_selection(state),
            Err(e) => {
                debug!(dir = %self.cwd.display(), "completion failed: {e}");
                self.log.push("Error: Cannot read directory");
            }
        }
    }

    fn enter_selection(&mut self, state: CompletionState) {
        self.log.push("Matching files:");
        for (i, name) in state.candidates.iter().enumerate() {
            self.log.push(format!("{}. {name}", i + 1));
        }
        self.log
            .push("Enter number to select (or press Esc to cancel):");
        self.log.follow_tail();
        self.mode = Mode::Selecting(state);
    }

    fn interrupt(&mut self) {
        if self.job.signal(JobSignal::Interrupt).is_some() {
            self.log.push("^C");
        }
        if let Some(watch) = &self.watch {
            watch.cancel();
            self.log.push("Stopping multiwatch...");
        }
        if let Mode::Selecting(_) = self.mode {
            self.log.push("Selection cancelled");
        }
        self.mode = Mode::Normal;
        self.input.clear();
    }

    fn stop(&mut self) {
        if let Some(pid) = self.job.signal(JobSignal::Stop) {
            self.log.push(format!("[{pid}]+ Stopped"));
        }
        self.input.clear();
    }

    fn accept_line(&mut self) -> Outcome {
        if self.input.as_str().ends_with('\\') {
            self.input.end();
            self.input.backspace();
            self.input.insert_char('\n');
            return Outcome::Continue;
        }

        let raw = self.input.take();
        let line = raw.trim();
        if line.is_empty() {
            return Outcome::Continue;
        }

        self.log.push_text(&format!("{}{line}", self.prompt()));
        if self.history.push(line) {
            self.persist(line);
        }

        let outcome = self.execute(line);
        self.history.reset_cursor();
        self.log.follow_tail();
        outcome
    }

    fn persist(&mut self, line: &str) {
        if let Err(e) = self.store.append(line) {
            warn!(session = self.id, "history persistence disabled: {e:#}");
            self.log
                .push(format!("history: {e:#} (keeping history in memory only)"));
            self.store = HistoryStore::disabled();
        }
    }

    /// Echo `line` verbatim after the prompt and run it, bypassing history.
    pub fn run_batch_line(&mut self, line: &str) -> Outcome {
        self.log.push(format!("{}{line}", self.prompt()));
        self.execute(line)
    }

    /// Parse and run one command line.
    ///
    /// Every failure ends up as lines in the output log.
    pub fn execute(&mut self, line: &str) -> Outcome {
        let command = match parser::parse(line, &self.cwd) {
            Ok(command) => command,
            Err(ParseError::Empty) => return Outcome::Continue,
            Err(e) => {
                self.log.push(e.to_string());
                return Outcome::Continue;
            }
        };

        match command {
            Command::Clear => self.log.clear(),
            Command::Exit => return Outcome::Exit,
            Command::Close => return Outcome::Close,
            Command::History(cmd) => self.run_builtin(cmd),
            Command::Cd(cmd) => self.run_builtin(cmd),
            Command::Usage { output, .. } => self.log.push_text(&output),
            Command::Watch(commands) => return Outcome::Watch(commands),
            Command::Pipeline(pipeline) => {
                let orchestrator = Orchestrator::new(&self.cwd, &self.env, &self.job);
                match orchestrator.run_pipeline(&pipeline, &mut self.log) {
                    Ok(codes) => debug!(session = self.id, ?codes, "pipeline finished"),
                    Err(e) => self.log.push(e.to_string()),
                }
            }
            Command::Simple(cmd) => {
                let orchestrator = Orchestrator::new(&self.cwd, &self.env, &self.job);
                match orchestrator.run_simple(&cmd, &mut self.log) {
                    Ok(JobEnd::Exited(code)) => debug!(session = self.id, code, "command finished"),
                    Ok(JobEnd::Stopped(pid)) => self.log.push(format!("[{pid}]+ Stopped")),
                    Err(e) => self.log.push(e.to_string()),
                }
            }
        }
        Outcome::Continue
    }

    fn run_builtin<T: BuiltinCommand>(&mut self, cmd: T) {
        let mut out = Vec::new();
        let mut ctx = BuiltinContext {
            cwd: &mut self.cwd,
            history: &self.history,
            env: &self.env,
        };
        if let Err(e) = builtin::run(cmd, &mut out, &mut ctx) {
            self.log.push(format!("{}: {e:#}", T::name()));
        }
        self.log.push_text(&String::from_utf8_lossy(&out));
    }

    /// Launch a watch set for this session and bind its cancel handle, so
    /// an interrupt here stops it.
    pub fn start_watch(&mut self, commands: &[String], settings: &WatchSettings) -> Option<WatchSet> {
        let set = WatchSet::start(commands, &self.cwd, &self.env, settings, &mut self.log)?;
        self.watch = Some(set.cancel_handle());
        Some(set)
    }

    /// Stop `set` and record it in this session's log.
    pub fn finish_watch(&mut self, set: WatchSet) {
        self.watch = None;
        set.stop(&mut self.log);
        self.log.follow_tail();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn session_in(dir: &Path) -> Session {
        let mut env = Environment::default();
        env.set_var("PATH", "/usr/local/bin:/usr/bin:/bin");
        Session::new(1, dir.to_path_buf(), env, HistoryStore::disabled())
    }

    fn canonical_tempdir() -> (TempDir, PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let path = fs::canonicalize(temp.path()).expect("canonicalize");
        (temp, path)
    }

    fn type_line(session: &mut Session, text: &str) {
        for c in text.chars() {
            session.handle(Event::Insert(c));
        }
    }

    fn submit(session: &mut Session, text: &str) -> Outcome {
        type_line(session, text);
        session.handle(Event::AcceptLine)
    }

    #[test]
    fn test_prompt_abbreviates_home() {
        let mut env = Environment::default();
        env.set_var("HOME", "/home/ann");
        let session = Session::new(
            1,
            PathBuf::from("/home/ann/src"),
            env,
            HistoryStore::disabled(),
        );
        assert_eq!(session.prompt(), "tabshell:~/src$ ");
    }

    #[test]
    fn test_accept_echoes_and_records_history() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);

        assert_eq!(submit(&mut session, "  cd .  "), Outcome::Continue);
        let echo = format!("tabshell:{}$ cd .", dir.display());
        assert_eq!(session.log().lines(), [echo.as_str()]);
        assert_eq!(session.history().entries().collect::<Vec<_>>(), ["cd ."]);
        assert!(session.input().is_empty());

        submit(&mut session, "cd .");
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_blank_line_does_nothing() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        submit(&mut session, "   ");
        assert!(session.log().is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_trailing_backslash_continues_line() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        type_line(&mut session, "echo a \\");
        session.handle(Event::CursorHome);
        assert_eq!(session.handle(Event::AcceptLine), Outcome::Continue);
        assert_eq!(session.input().as_str(), "echo a \n");
        assert_eq!(session.input().cursor(), "echo a \n".len());
        assert!(session.log().is_empty());
    }

    #[test]
    fn test_continued_line_echoes_one_log_line_per_physical_line() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        type_line(&mut session, "echo a \\");
        session.handle(Event::AcceptLine);
        type_line(&mut session, "b");
        session.handle(Event::AcceptLine);

        let prompt = session.prompt();
        let lines = session.log().lines();
        assert_eq!(lines[0], format!("{prompt}echo a "));
        assert_eq!(lines[1], "b");
        assert!(lines.iter().all(|l| !l.contains('\n')));
        assert_eq!(session.history().entries().last(), Some("echo a \nb"));
    }

    #[test]
    fn test_cd_updates_prompt_and_reports_missing_dir() {
        let (_tmp, dir) = canonical_tempdir();
        fs::create_dir(dir.join("sub")).unwrap();
        let mut session = session_in(&dir);

        submit(&mut session, "cd sub");
        assert_eq!(session.cwd(), dir.join("sub"));
        submit(&mut session, "cd ..");
        assert_eq!(session.cwd(), dir);

        let before = session.log().len();
        submit(&mut session, "cd missing_dir");
        assert_eq!(session.cwd(), dir);
        assert_eq!(session.log().len(), before + 2);
        assert_eq!(session.log().last(), Some("cd: no such directory: missing_dir"));
    }

    #[test]
    fn test_clear_is_idempotent_and_resets_scroll() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        for _ in 0..5 {
            submit(&mut session, "cd .");
        }
        session.handle(Event::Scroll(3));
        assert_eq!(session.log().scroll_offset(), 3);

        for _ in 0..2 {
            submit(&mut session, "clear");
            assert!(session.log().is_empty());
            assert_eq!(session.log().scroll_offset(), 0);
        }
    }

    #[test]
    fn test_exit_close_and_watch_outcomes() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        assert_eq!(submit(&mut session, "exit"), Outcome::Exit);
        assert_eq!(submit(&mut session, "close"), Outcome::Close);
        assert_eq!(
            submit(&mut session, r#"multiWatch ["date"]"#),
            Outcome::Watch(vec!["date".into()])
        );
        submit(&mut session, "multiWatch date");
        assert_eq!(
            session.log().last(),
            Some(r#"multiWatch syntax: multiWatch ["cmd1", "cmd2"]"#)
        );
    }

    #[test]
    fn test_history_builtin_lists_entries() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        submit(&mut session, "cd .");
        submit(&mut session, "history");
        let lines = session.log().lines();
        assert_eq!(&lines[lines.len() - 2..], ["1  cd .", "2  history"]);
    }

    #[test]
    fn test_history_recall_clamps_and_empties() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        submit(&mut session, "cd .");
        submit(&mut session, "clear");

        session.handle(Event::HistoryOlder);
        assert_eq!(session.input().as_str(), "clear");
        session.handle(Event::HistoryOlder);
        session.handle(Event::HistoryOlder);
        assert_eq!(session.input().as_str(), "cd .");
        session.handle(Event::HistoryNewer);
        assert_eq!(session.input().as_str(), "clear");
        session.handle(Event::HistoryNewer);
        assert_eq!(session.input().as_str(), "");
    }

    #[test]
    fn test_reverse_search_prefers_exact_match() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        submit(&mut session, "cd .");
        submit(&mut session, "cd ..");
        submit(&mut session, "clear");

        session.handle(Event::ReverseSearch);
        type_line(&mut session, "cd .");
        assert_eq!(session.log().last(), Some("(reverse-i-search): cd ."));
        session.handle(Event::AcceptLine);

        assert_eq!(session.mode(), &Mode::Normal);
        assert_eq!(session.log().last(), Some("Found: cd ."));
        assert_eq!(session.input().as_str(), "cd .");
    }

    #[test]
    fn test_reverse_search_substring_and_miss() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        submit(&mut session, "history -n 3");
        submit(&mut session, "clear");

        session.handle(Event::ReverseSearch);
        type_line(&mut session, "-n");
        session.handle(Event::AcceptLine);
        assert_eq!(session.log().last(), Some("Match: history -n 3"));

        session.handle(Event::ReverseSearch);
        type_line(&mut session, "zz");
        session.handle(Event::Backspace);
        assert_eq!(session.log().last(), Some("(reverse-i-search): z"));
        session.handle(Event::AcceptLine);
        assert_eq!(session.log().last(), Some("No match found in history"));
        assert!(session.input().is_empty());
    }

    #[test]
    fn test_reverse_search_empty_or_cancelled_keeps_input() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        type_line(&mut session, "draft");

        session.handle(Event::ReverseSearch);
        session.handle(Event::AcceptLine);
        assert_eq!(session.log().last(), Some("Search cancelled"));
        assert_eq!(session.input().as_str(), "draft");

        session.handle(Event::ReverseSearch);
        type_line(&mut session, "dr");
        session.handle(Event::Cancel);
        assert_eq!(session.mode(), &Mode::Normal);
        assert_eq!(session.input().as_str(), "draft");
    }

    #[test]
    fn test_ambiguous_completion_selection() {
        let (_tmp, dir) = canonical_tempdir();
        fs::write(dir.join("foo1.txt"), "").unwrap();
        fs::write(dir.join("foo2.txt"), "").unwrap();
        let mut session = session_in(&dir);

        type_line(&mut session, "cat foo");
        session.handle(Event::Complete);
        assert!(matches!(session.mode(), Mode::Selecting(_)));
        assert_eq!(
            session.log().lines(),
            [
                "Matching files:",
                "1. foo1.txt",
                "2. foo2.txt",
                "Enter number to select (or press Esc to cancel):"
            ]
        );

        session.handle(Event::Insert('x'));
        assert_eq!(session.input().as_str(), "cat foo");
        session.handle(Event::Insert('7'));
        assert_eq!(
            session.log().last(),
            Some("Invalid selection. Please enter a number between 1 and 2")
        );
        session.handle(Event::AcceptLine);
        assert_eq!(
            session.log().last(),
            Some("Please enter a number to select a file, or press Esc to cancel")
        );

        session.handle(Event::Insert('2'));
        assert_eq!(session.mode(), &Mode::Normal);
        assert_eq!(session.input().as_str(), "cat foo2.txt");
        assert_eq!(session.log().last(), Some("Selected: foo2.txt"));
    }

    #[test]
    fn test_completion_cancel_and_single_match() {
        let (_tmp, dir) = canonical_tempdir();
        fs::write(dir.join("foo1.txt"), "").unwrap();
        fs::write(dir.join("foo2.txt"), "").unwrap();
        fs::write(dir.join("report.md"), "").unwrap();
        let mut session = session_in(&dir);

        type_line(&mut session, "foo");
        session.handle(Event::Complete);
        session.handle(Event::Cancel);
        assert_eq!(session.mode(), &Mode::Normal);
        assert_eq!(session.log().last(), Some("Selection cancelled"));
        assert_eq!(session.input().as_str(), "foo");

        session.handle(Event::AcceptLine);
        type_line(&mut session, "cat rep");
        session.handle(Event::Complete);
        assert_eq!(session.mode(), &Mode::Normal);
        assert_eq!(session.input().as_str(), "cat report.md");
        assert_eq!(session.input().cursor(), "cat report.md".len());
    }

    #[test]
    fn test_completion_in_missing_directory() {
        let (tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir.join("gone"));
        type_line(&mut session, "x");
        session.handle(Event::Complete);
        assert_eq!(session.log().last(), Some("Error: Cannot read directory"));
        drop(tmp);
    }

    #[test]
    fn test_interrupt_without_job_clears_state() {
        let (_tmp, dir) = canonical_tempdir();
        fs::write(dir.join("foo1.txt"), "").unwrap();
        fs::write(dir.join("foo2.txt"), "").unwrap();
        let mut session = session_in(&dir);

        type_line(&mut session, "foo");
        session.handle(Event::Complete);
        session.handle(Event::Interrupt);
        assert_eq!(session.mode(), &Mode::Normal);
        assert_eq!(session.log().last(), Some("Selection cancelled"));
        assert!(session.input().is_empty());

        let before = session.log().len();
        type_line(&mut session, "abc");
        session.handle(Event::Stop);
        assert_eq!(session.log().len(), before);
        assert!(session.input().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_commands_append_output() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        submit(&mut session, "printf one\\ntwo");
        submit(&mut session, "printf b\\na | sort");
        submit(&mut session, "nosuchprogram-xyz");

        let prompt = session.prompt();
        assert_eq!(
            session.log().lines(),
            [
                format!("{prompt}printf one\\ntwo"),
                "one".to_string(),
                "two".to_string(),
                format!("{prompt}printf b\\na | sort"),
                "a".to_string(),
                "b".to_string(),
                format!("{prompt}nosuchprogram-xyz"),
                "nosuchprogram-xyz: command not found".to_string(),
            ]
        );
    }

    #[test]
    fn test_batch_line_skips_history() {
        let (_tmp, dir) = canonical_tempdir();
        let mut session = session_in(&dir);
        session.run_batch_line("cd .");
        assert!(session.history().is_empty());
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn test_unwritable_history_falls_back_to_memory() {
        let (_tmp, dir) = canonical_tempdir();
        let store = HistoryStore::new(Some(dir.join("no/such/dir/history")));
        let mut session = Session::new(1, dir.clone(), Environment::default(), store);

        submit(&mut session, "cd .");
        assert!(session.log().last().unwrap().starts_with("history: "));
        submit(&mut session, "clear");
        submit(&mut session, "cd .");
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.history().len(), 3);
    }
}
