//! Periodic re-execution of watched commands with change reporting.
//!
//! Each watched command gets a private capture file and a supervisor thread
//! that runs the command into that file, waits for it, sleeps, and repeats.
//! The owner polls the capture files and logs a timestamped block whenever a
//! file's content differs from what was last reported for it. Cancellation
//! is a broadcast: dropping the single cancel sender wakes every supervisor
//! and the polling wait at once.

use crate::command::Stage;
use crate::env::Environment;
use crate::exec::spawn_into_file;
use crate::lexer::split_words;
use crate::output::OutputLog;
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{self, Child};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Line framing every reported block.
pub const SEPARATOR: &str = "----------------------------------------------------";

/// How often a supervisor checks whether its running child has exited.
const CHILD_POLL: Duration = Duration::from_millis(50);

/// Distinguishes capture files of watch sets started by the same process.
static NEXT_SET: AtomicUsize = AtomicUsize::new(0);

/// Timing of a watch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    /// Pause between two runs of the same command.
    pub interval: Duration,
    /// Granularity of capture file checks.
    pub poll: Duration,
}

/// Clonable handle that stops a running watch set.
#[derive(Debug, Clone)]
pub struct WatchCancel(Arc<Mutex<Option<Sender<()>>>>);

impl WatchCancel {
    /// A fresh handle and the receiver that observes it.
    ///
    /// Nothing is ever sent; receivers see the channel disconnect once
    /// [`WatchCancel::cancel`] drops the only sender.
    pub fn new() -> (Self, Receiver<()>) {
        let (tx, rx) = crossbeam_channel::bounded(0);
        (Self(Arc::new(Mutex::new(Some(tx)))), rx)
    }

    pub fn cancel(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

/// Blocks up to `timeout`; `true` once the cancel sender is gone.
fn cancelled_within(rx: &Receiver<()>, timeout: Duration) -> bool {
    !matches!(rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
}

struct Watched {
    command: String,
    capture: PathBuf,
    snapshot: String,
    supervisor: Option<JoinHandle<()>>,
}

/// The commands currently under watch, with their capture files and the
/// last content reported for each.
pub struct WatchSet {
    watched: Vec<Watched>,
    cancel: WatchCancel,
    cancel_rx: Receiver<()>,
    poll: Duration,
}

impl WatchSet {
    /// Create capture files and launch one supervisor per command.
    ///
    /// Progress and per-command failures are written to `log`. Returns
    /// `None` when nothing could be started, including an empty list.
    pub fn start(
        commands: &[String],
        cwd: &Path,
        env: &Environment,
        settings: &WatchSettings,
        log: &mut OutputLog,
    ) -> Option<Self> {
        if commands.is_empty() {
            log.push("No commands to watch");
            return None;
        }

        let (cancel, cancel_rx) = WatchCancel::new();
        let set_id = NEXT_SET.fetch_add(1, Ordering::Relaxed);
        let mut watched = Vec::with_capacity(commands.len());

        for (i, command) in commands.iter().enumerate() {
            let Some(stage) = Stage::from_words(split_words(command)) else {
                continue;
            };
            let capture = capture_path(set_id, i);
            if let Err(e) = create_capture(&capture) {
                warn!(path = %capture.display(), "failed to create capture file: {e}");
                log.push("Failed to create temp file");
                continue;
            }

            let supervisor = Supervisor {
                stage,
                capture: capture.clone(),
                cwd: cwd.to_path_buf(),
                env: env.clone(),
                interval: settings.interval,
                cancel: cancel_rx.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("watch-{i}"))
                .spawn(move || supervisor.run());
            match spawned {
                Ok(handle) => watched.push(Watched {
                    command: command.clone(),
                    capture,
                    snapshot: String::new(),
                    supervisor: Some(handle),
                }),
                Err(e) => {
                    log.push(format!("Failed to start watching \"{command}\": {e}"));
                    let _ = fs::remove_file(&capture);
                }
            }
        }

        if watched.is_empty() {
            return None;
        }

        log.push("multiWatch started (Ctrl+C to stop)");
        log.push(format!("Monitoring {} commands...", watched.len()));
        debug!(set_id, count = watched.len(), "watch set started");
        Some(Self {
            watched,
            cancel,
            cancel_rx,
            poll: settings.poll,
        })
    }

    /// Report every capture file whose content changed since it was last
    /// reported. Empty content is skipped. Returns the number of blocks
    /// written to `log`.
    pub fn poll(&mut self, log: &mut OutputLog) -> usize {
        let mut emitted = 0;
        for watched in &mut self.watched {
            let content = match fs::read(&watched.capture) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    debug!(path = %watched.capture.display(), "capture not readable: {e}");
                    continue;
                }
            };
            if content.is_empty() || content == watched.snapshot {
                continue;
            }

            let stamp = Local::now().format("%a %b %e %H:%M:%S %Y");
            log.push(format!("\"{}\", {stamp}", watched.command));
            log.push(SEPARATOR);
            log.push_text(&content);
            log.push(SEPARATOR);
            watched.snapshot = content;
            emitted += 1;
        }
        emitted
    }

    /// Block for at most `timeout`; `true` when the set has been cancelled.
    pub fn wait_cancelled(&self, timeout: Duration) -> bool {
        cancelled_within(&self.cancel_rx, timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll
    }

    pub fn cancel_handle(&self) -> WatchCancel {
        self.cancel.clone()
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.watched.iter().map(|w| w.command.as_str())
    }

    pub fn capture_paths(&self) -> impl Iterator<Item = &Path> {
        self.watched.iter().map(|w| w.capture.as_path())
    }

    /// Kill every supervised child, join the supervisors, delete the
    /// capture files and record the end of monitoring.
    pub fn stop(mut self, log: &mut OutputLog) {
        self.shutdown();
        log.push("multiWatch stopped!");
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        for watched in &mut self.watched {
            if let Some(handle) = watched.supervisor.take() {
                if handle.join().is_err() {
                    warn!(command = %watched.command, "watch supervisor panicked");
                }
            }
            match fs::remove_file(&watched.capture) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %watched.capture.display(), "failed to remove capture file: {e}"),
            }
        }
    }
}

impl Drop for WatchSet {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn capture_path(set_id: usize, index: usize) -> PathBuf {
    std::env::temp_dir().join(format!(
        ".tabshell-watch.{}_{set_id}_{index}.txt",
        process::id()
    ))
}

fn create_capture(path: &Path) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map(drop)
}

/// Re-runs one command into its capture file until cancelled.
struct Supervisor {
    stage: Stage,
    capture: PathBuf,
    cwd: PathBuf,
    env: Environment,
    interval: Duration,
    cancel: Receiver<()>,
}

impl Supervisor {
    fn run(self) {
        loop {
            match spawn_into_file(&self.stage, &self.cwd, &self.env, &self.capture) {
                Ok(mut child) => {
                    if !self.wait_child(&mut child) {
                        return;
                    }
                }
                Err(e) => {
                    if let Err(write_err) = fs::write(&self.capture, format!("{e}\n")) {
                        debug!(path = %self.capture.display(), "capture write failed: {write_err}");
                    }
                }
            }
            if cancelled_within(&self.cancel, self.interval) {
                return;
            }
        }
    }

    /// Wait for the current run; `false` when cancelled, after the child
    /// has been killed and reaped.
    fn wait_child(&self, child: &mut Child) -> bool {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(program = %self.stage.program, ?status, "watched run finished");
                    return true;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(program = %self.stage.program, "waiting for watched run failed: {e}");
                    return true;
                }
            }
            if cancelled_within(&self.cancel, CHILD_POLL) {
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn settings(interval_ms: u64) -> WatchSettings {
        WatchSettings {
            interval: Duration::from_millis(interval_ms),
            poll: Duration::from_millis(50),
        }
    }

    fn commands(cmds: &[&str]) -> Vec<String> {
        cmds.iter().map(|c| c.to_string()).collect()
    }

    /// Poll until `want` blocks have been emitted or the deadline passes.
    fn poll_until(set: &mut WatchSet, log: &mut OutputLog, want: usize, limit: Duration) -> usize {
        let deadline = Instant::now() + limit;
        let mut total = 0;
        while total < want && Instant::now() < deadline {
            total += set.poll(log);
            set.wait_cancelled(set.poll_interval());
        }
        total
    }

    #[test]
    fn two_commands_get_one_block_each_and_clean_up() {
        let tmp = TempDir::new().unwrap();
        let mut log = OutputLog::new();
        let mut set = WatchSet::start(
            &commands(&["echo a", "echo b"]),
            tmp.path(),
            &Environment::capture(),
            &settings(2000),
            &mut log,
        )
        .expect("watch starts");

        let captures: Vec<PathBuf> = set.capture_paths().map(Path::to_path_buf).collect();
        assert_eq!(captures.len(), 2);
        assert!(captures.iter().all(|p| p.exists()));
        assert_eq!(log.lines()[..2], ["multiWatch started (Ctrl+C to stop)", "Monitoring 2 commands..."]);

        let blocks = poll_until(&mut set, &mut log, 2, Duration::from_secs(5));
        assert_eq!(blocks, 2);

        let lines = log.lines();
        let header_a = lines.iter().position(|l| l.starts_with("\"echo a\", ")).unwrap();
        assert_eq!(lines[header_a + 1], SEPARATOR);
        assert_eq!(lines[header_a + 2], "a");
        assert_eq!(lines[header_a + 3], SEPARATOR);
        let header_b = lines.iter().position(|l| l.starts_with("\"echo b\", ")).unwrap();
        assert_eq!(lines[header_b + 2], "b");

        set.stop(&mut log);
        assert!(captures.iter().all(|p| !p.exists()));
        assert_eq!(log.last(), Some("multiWatch stopped!"));
    }

    #[test]
    fn unchanged_output_is_reported_once() {
        let tmp = TempDir::new().unwrap();
        let mut log = OutputLog::new();
        let mut set = WatchSet::start(
            &commands(&["echo same"]),
            tmp.path(),
            &Environment::capture(),
            &settings(10),
            &mut log,
        )
        .unwrap();

        poll_until(&mut set, &mut log, 1, Duration::from_secs(5));
        let deadline = Instant::now() + Duration::from_millis(300);
        while Instant::now() < deadline {
            set.poll(&mut log);
            set.wait_cancelled(Duration::from_millis(20));
        }

        let headers = log.lines().iter().filter(|l| l.starts_with("\"echo same\"")).count();
        assert_eq!(headers, 1);
    }

    #[test]
    fn changing_output_is_reported_again() {
        let tmp = TempDir::new().unwrap();
        let mut log = OutputLog::new();
        let mut set = WatchSet::start(
            &commands(&["date +%s%N"]),
            tmp.path(),
            &Environment::capture(),
            &settings(20),
            &mut log,
        )
        .unwrap();

        let blocks = poll_until(&mut set, &mut log, 2, Duration::from_secs(5));
        assert!(blocks >= 2);
    }

    #[test]
    fn empty_command_list_is_a_user_error() {
        let tmp = TempDir::new().unwrap();
        let mut log = OutputLog::new();
        let set = WatchSet::start(&[], tmp.path(), &Environment::capture(), &settings(10), &mut log);
        assert!(set.is_none());
        assert_eq!(log.lines(), ["No commands to watch"]);
    }

    #[test]
    fn missing_program_is_reported_through_capture() {
        let tmp = TempDir::new().unwrap();
        let mut log = OutputLog::new();
        let mut set = WatchSet::start(
            &commands(&["no-such-program-xyz"]),
            tmp.path(),
            &Environment::capture(),
            &settings(1000),
            &mut log,
        )
        .unwrap();

        poll_until(&mut set, &mut log, 1, Duration::from_secs(5));
        assert!(
            log.lines()
                .iter()
                .any(|l| l == "no-such-program-xyz: command not found")
        );
    }

    #[test]
    fn cancel_handle_stops_long_running_child_promptly() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let pid_file = tmp.path().join("pid");
        let script = tmp.path().join("sleeper.sh");
        fs::write(&script, "#!/bin/sh\necho $$ > pid.tmp\nmv pid.tmp pid\nexec sleep 30\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut log = OutputLog::new();
        let set = WatchSet::start(
            &commands(&["./sleeper.sh"]),
            tmp.path(),
            &Environment::capture(),
            &settings(1000),
            &mut log,
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !pid_file.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let pid: libc::pid_t = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert_eq!(unsafe { libc::kill(pid, 0) }, 0);

        let handle = set.cancel_handle();
        assert!(!set.wait_cancelled(Duration::from_millis(10)));
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(set.wait_cancelled(Duration::from_secs(5)));

        let started = Instant::now();
        set.stop(&mut log);
        assert!(started.elapsed() < Duration::from_secs(5));

        assert_eq!(unsafe { libc::kill(pid, 0) }, -1);
        assert_eq!(io::Error::last_os_error().raw_os_error(), Some(libc::ESRCH));
    }

    #[test]
    fn dropping_a_set_removes_capture_files() {
        let tmp = TempDir::new().unwrap();
        let mut log = OutputLog::new();
        let set = WatchSet::start(
            &commands(&["echo x"]),
            tmp.path(),
            &Environment::capture(),
            &settings(1000),
            &mut log,
        )
        .unwrap();
        let captures: Vec<PathBuf> = set.capture_paths().map(Path::to_path_buf).collect();

        drop(set);

        assert!(captures.iter().all(|p| !p.exists()));
    }
}
