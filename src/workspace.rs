//! The set of open sessions and the single dispatch point for front-end
//! events, including the watch loop that keeps dispatching while a watch
//! set is running.

use crate::config::Config;
use crate::editor::ModeKind;
use crate::env::Environment;
use crate::history::HistoryStore;
use crate::job::SignalRouter;
use crate::session::{Event, Outcome, Session};
use crate::watch::WatchSettings;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Longest the watch loop blocks before draining front-end events again.
const WATCH_SLICE: Duration = Duration::from_millis(50);

/// Whether the program keeps running after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Source of events and sink of redraw requests for the workspace.
pub trait EventPump {
    /// Events that arrived since the last call; never blocks.
    fn pending(&mut self) -> Result<Vec<Event>>;

    /// Render the current state.
    fn redraw(&mut self, workspace: &Workspace) -> Result<()>;

    /// A foreground command is about to run.
    fn suspend(&mut self) -> Result<()> {
        Ok(())
    }

    /// The foreground command has finished.
    fn resume(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Pump for callers without an interactive front-end.
#[derive(Debug, Default)]
pub struct NullPump;

impl EventPump for NullPump {
    fn pending(&mut self) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }

    fn redraw(&mut self, _workspace: &Workspace) -> Result<()> {
        Ok(())
    }
}

pub struct Workspace {
    sessions: Vec<Session>,
    focus: usize,
    next_id: usize,
    start_dir: PathBuf,
    config: Config,
    env: Environment,
    router: SignalRouter,
}

impl Workspace {
    /// A workspace with one session started in `start_dir`.
    pub fn new(config: Config, env: Environment, start_dir: PathBuf) -> Self {
        let mut workspace = Self {
            sessions: Vec::new(),
            focus: 0,
            next_id: 1,
            start_dir,
            config,
            env,
            router: SignalRouter::new(),
        };
        workspace.new_session();
        workspace
    }

    /// Like [`Workspace::new`], but history is never written to disk.
    pub fn headless(mut config: Config, env: Environment, start_dir: PathBuf) -> Self {
        config.history_path = None;
        Self::new(config, env, start_dir)
    }

    /// Handle for routing interrupts that arrive as process signals.
    pub fn router(&self) -> SignalRouter {
        self.router.clone()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session_ids(&self) -> Vec<usize> {
        self.sessions.iter().map(Session::id).collect()
    }

    pub fn focus_index(&self) -> usize {
        self.focus
    }

    pub fn focused(&self) -> &Session {
        &self.sessions[self.focus]
    }

    pub fn focused_mut(&mut self) -> &mut Session {
        &mut self.sessions[self.focus]
    }

    /// Open a session in the start directory and focus it.
    pub fn new_session(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        let store = HistoryStore::new(self.config.history_path.clone());
        self.sessions.push(Session::new(
            id,
            self.start_dir.clone(),
            self.env.clone(),
            store,
        ));
        self.set_focus(self.sessions.len() - 1);
        info!(session = id, "session opened");
        id
    }

    /// Close the focused session; refused when it is the last one.
    pub fn close_session(&mut self) -> bool {
        if self.sessions.len() <= 1 {
            return false;
        }
        let closed = self.sessions.remove(self.focus);
        info!(session = closed.id(), "session closed");
        self.set_focus(self.focus.min(self.sessions.len() - 1));
        true
    }

    /// Focus the session at `index`; out of range is ignored.
    pub fn switch_to(&mut self, index: usize) -> bool {
        if index >= self.sessions.len() {
            return false;
        }
        self.set_focus(index);
        true
    }

    pub fn next_session(&mut self) {
        self.set_focus((self.focus + 1) % self.sessions.len());
    }

    fn set_focus(&mut self, index: usize) {
        self.focus = index;
        self.router.focus(self.sessions[index].job());
    }

    fn position(&self, id: usize) -> Option<usize> {
        self.sessions.iter().position(|s| s.id() == id)
    }

    /// Route one front-end event.
    pub fn dispatch(&mut self, event: Event, pump: &mut dyn EventPump) -> Result<Control> {
        self.route(event, pump, false)
    }

    fn route(&mut self, event: Event, pump: &mut dyn EventPump, watching: bool) -> Result<Control> {
        match event {
            Event::NewSession => {
                self.new_session();
            }
            Event::CloseSession => {
                self.close_session();
            }
            Event::SwitchSession(index) => {
                self.switch_to(index);
            }
            Event::NextSession => self.next_session(),
            event => {
                let runs_command = event == Event::AcceptLine
                    && self.focused().mode().kind() == ModeKind::Normal;
                if runs_command {
                    pump.suspend()?;
                }
                let outcome = self.focused_mut().handle(event);
                if runs_command {
                    pump.resume()?;
                }
                return self.apply(outcome, pump, watching);
            }
        }
        Ok(Control::Continue)
    }

    fn apply(&mut self, outcome: Outcome, pump: &mut dyn EventPump, watching: bool) -> Result<Control> {
        match outcome {
            Outcome::Continue => Ok(Control::Continue),
            Outcome::Exit => Ok(Control::Quit),
            Outcome::Close if self.close_session() => Ok(Control::Continue),
            Outcome::Close => Ok(Control::Quit),
            Outcome::Watch(_) if watching => {
                self.focused_mut()
                    .log_mut()
                    .push("multiWatch is already running");
                Ok(Control::Continue)
            }
            Outcome::Watch(commands) => self.run_watch(&commands, pump),
        }
    }

    /// Monitor `commands` for the focused session until the watch is
    /// cancelled, the session is closed, or the program is asked to quit.
    ///
    /// Capture files are checked every poll interval; front-end events are
    /// drained and dispatched in between so every session stays usable.
    fn run_watch(&mut self, commands: &[String], pump: &mut dyn EventPump) -> Result<Control> {
        let settings = self.watch_settings();
        let owner = self.focused().id();
        let Some(mut set) = self.focused_mut().start_watch(commands, &settings) else {
            return Ok(Control::Continue);
        };
        self.router.arm_watch(set.cancel_handle());
        pump.redraw(self)?;

        let mut last_poll: Option<Instant> = None;
        let control = 'watch: loop {
            let Some(index) = self.position(owner) else {
                debug!(session = owner, "watching session closed");
                break Control::Continue;
            };
            if last_poll.is_none_or(|at| at.elapsed() >= set.poll_interval()) {
                last_poll = Some(Instant::now());
                if set.poll(self.sessions[index].log_mut()) > 0 {
                    pump.redraw(self)?;
                }
            }

            let events = pump.pending()?;
            if !events.is_empty() {
                for event in events {
                    if self.route(event, pump, true)? == Control::Quit {
                        break 'watch Control::Quit;
                    }
                }
                pump.redraw(self)?;
            }

            if set.wait_cancelled(WATCH_SLICE) {
                break Control::Continue;
            }
        };

        self.router.disarm_watch();
        match self.position(owner) {
            Some(index) => self.sessions[index].finish_watch(set),
            None => drop(set),
        }
        pump.redraw(self)?;
        Ok(control)
    }

    fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            interval: self.config.watch_interval,
            poll: self.config.poll_interval,
        }
    }

    /// Watch without a front-end: nobody can press Ctrl+C, so the set runs
    /// for one watch interval plus one poll (or until SIGINT) and is then
    /// stopped.
    fn run_watch_bounded(&mut self, commands: &[String]) {
        let settings = self.watch_settings();
        let Some(mut set) = self.focused_mut().start_watch(commands, &settings) else {
            return;
        };
        self.router.arm_watch(set.cancel_handle());

        let deadline = Instant::now() + settings.interval + settings.poll;
        loop {
            set.poll(self.focused_mut().log_mut());
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() || set.wait_cancelled(left.min(set.poll_interval())) {
                break;
            }
        }
        set.poll(self.focused_mut().log_mut());

        self.router.disarm_watch();
        self.focused_mut().finish_watch(set);
    }

    /// Batch mode: run every line of `input` in the focused session, then
    /// write its whole output log to `out`.
    pub fn run_headless(&mut self, input: impl BufRead, mut out: impl Write) -> Result<()> {
        let mut pump = NullPump;
        for line in input.lines() {
            let line = line.context("failed to read command input")?;
            let control = match self.focused_mut().run_batch_line(&line) {
                Outcome::Watch(commands) => {
                    self.run_watch_bounded(&commands);
                    Control::Continue
                }
                outcome => self.apply(outcome, &mut pump, false)?,
            };
            if control == Control::Quit {
                break;
            }
        }
        for line in self.focused().log().lines() {
            writeln!(out, "{line}").context("failed to write output log")?;
        }
        out.flush().context("failed to flush output log")?;
        Ok(())
    }
}
