//! Foreground job tracking and signal delivery.
//!
//! Every session owns a [`JobSlot`] holding the pid of the single command it
//! is currently waiting on. The [`SignalRouter`] is the only state shared
//! across sessions: it points at the focused session's slot and at the
//! cancel handle of the running watch, so an interrupt arriving from outside
//! the event loop (SIGINT or SIGTSTP delivered to the shell) reaches the
//! right place.

use crate::watch::WatchCancel;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Signals the shell forwards to a foreground job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSignal {
    /// SIGINT.
    Interrupt,
    /// SIGTSTP.
    Stop,
}

#[cfg(unix)]
fn deliver(pid: u32, signal: JobSignal) -> io::Result<()> {
    let signo = match signal {
        JobSignal::Interrupt => libc::SIGINT,
        JobSignal::Stop => libc::SIGTSTP,
    };
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, signo) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn deliver(_pid: u32, _signal: JobSignal) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "job signals are only supported on unix",
    ))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared slot for a session's foreground process id.
#[derive(Debug, Clone, Default)]
pub struct JobSlot(Arc<Mutex<Option<u32>>>);

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, pid: u32) {
        *lock(&self.0) = Some(pid);
    }

    pub fn clear(&self) {
        *lock(&self.0) = None;
    }

    pub fn current(&self) -> Option<u32> {
        *lock(&self.0)
    }

    /// Send `signal` to the foreground job and forget it.
    ///
    /// Returns the pid that was signalled, or `None` when no job was running.
    pub fn signal(&self, signal: JobSignal) -> Option<u32> {
        let pid = lock(&self.0).take()?;
        match deliver(pid, signal) {
            Ok(()) => debug!(pid, ?signal, "signal delivered to foreground job"),
            Err(e) => warn!(pid, ?signal, "failed to signal foreground job: {e}"),
        }
        Some(pid)
    }

    fn same_slot(&self, other: &JobSlot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Default)]
struct Routes {
    focused: JobSlot,
    watch: Option<WatchCancel>,
}

/// Process-wide routing for interrupts that arrive outside the event loop.
#[derive(Clone, Default)]
pub struct SignalRouter(Arc<Mutex<Routes>>);

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point interrupts at the focused session's job slot.
    pub fn focus(&self, slot: &JobSlot) {
        lock(&self.0).focused = slot.clone();
    }

    pub fn is_focused(&self, slot: &JobSlot) -> bool {
        lock(&self.0).focused.same_slot(slot)
    }

    pub fn arm_watch(&self, cancel: WatchCancel) {
        lock(&self.0).watch = Some(cancel);
    }

    pub fn disarm_watch(&self) {
        lock(&self.0).watch = None;
    }

    /// Interrupt the focused foreground job and cancel any active watch.
    pub fn interrupt(&self) {
        let routes = lock(&self.0);
        routes.focused.signal(JobSignal::Interrupt);
        if let Some(watch) = &routes.watch {
            watch.cancel();
        }
    }

    /// Stop the focused foreground job. Watches keep running.
    pub fn stop(&self) {
        lock(&self.0).focused.signal(JobSignal::Stop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn slot_set_and_clear() {
        let slot = JobSlot::new();
        assert_eq!(slot.current(), None);
        slot.set(42);
        assert_eq!(slot.clone().current(), Some(42));
        slot.clear();
        assert_eq!(slot.current(), None);
    }

    #[test]
    fn signal_on_empty_slot_is_noop() {
        assert_eq!(JobSlot::new().signal(JobSignal::Interrupt), None);
    }

    #[test]
    #[cfg(unix)]
    fn interrupt_reaches_focused_job() {
        let mut child = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
        let slot = JobSlot::new();
        slot.set(child.id());

        let router = SignalRouter::new();
        router.focus(&slot);
        assert!(router.is_focused(&slot));
        router.interrupt();

        let status = child.wait().expect("wait sleep");
        assert_eq!(crate::external::exit_code(status), 128 + libc::SIGINT);
        assert_eq!(slot.current(), None);
    }

    #[test]
    #[cfg(unix)]
    fn stop_reaches_focused_job_only() {
        let mut child = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
        let slot = JobSlot::new();
        slot.set(child.id());
        let (cancel, _rx) = WatchCancel::new();

        let router = SignalRouter::new();
        router.focus(&slot);
        router.arm_watch(cancel.clone());
        router.stop();

        let pid = libc::pid_t::try_from(child.id()).unwrap();
        let mut status = 0;
        let rc = unsafe { libc::waitpid(pid, &mut status, libc::WUNTRACED) };
        assert_eq!(rc, pid);
        assert!(libc::WIFSTOPPED(status));
        assert_eq!(libc::WSTOPSIG(status), libc::SIGTSTP);
        assert_eq!(slot.current(), None);
        assert!(!cancel.is_cancelled());

        child.kill().expect("kill sleep");
        child.wait().expect("wait sleep");
    }

    #[test]
    fn stop_without_job_is_noop() {
        let router = SignalRouter::new();
        router.focus(&JobSlot::new());
        router.stop();
    }

    #[test]
    fn interrupt_cancels_armed_watch() {
        let (cancel, _rx) = WatchCancel::new();
        let router = SignalRouter::new();
        router.arm_watch(cancel.clone());
        router.interrupt();
        assert!(cancel.is_cancelled());
    }
}
