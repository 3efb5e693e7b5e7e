//! Process orchestration: spawning single commands and pipelines, wiring
//! redirections and pipes, and capturing merged output into a session log.

use crate::command::{ExitCode, Pipeline, SimpleCommand, Stage};
use crate::env::Environment;
use crate::external::{exit_code, resolve_program};
use crate::job::JobSlot;
use crate::output::OutputLog;
use std::fs::{File, OpenOptions};
use std::io::{self, PipeReader, PipeWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use thiserror::Error;
use tracing::{debug, info};

/// Exit code of a pipeline stage whose program does not exist.
const NOT_FOUND: ExitCode = 127;
/// Exit code of a pipeline stage whose program could not be spawned.
const NOT_EXECUTABLE: ExitCode = 126;

/// Failures that abort one command without affecting the session.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipe failed: {0}")]
    Pipe(#[source] io::Error),
    #[error("open input: {}: {source}", .path.display())]
    OpenInput { path: PathBuf, source: io::Error },
    #[error("open output: {}: {source}", .path.display())]
    OpenOutput { path: PathBuf, source: io::Error },
    #[error("{program}: command not found")]
    NotFound { program: String },
    #[error("{program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("reading command output failed: {0}")]
    Capture(#[source] io::Error),
    #[error("waiting for command failed: {0}")]
    Wait(#[source] io::Error),
}

/// How a foreground command gave the session back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEnd {
    Exited(ExitCode),
    /// Stopped by SIGTSTP; the process is left as it is.
    Stopped(u32),
}

enum StageRun {
    Running(Child),
    Failed(ExitCode),
}

impl StageRun {
    fn wait(&mut self) -> io::Result<ExitCode> {
        match self {
            StageRun::Running(child) => child.wait().map(exit_code),
            StageRun::Failed(code) => Ok(*code),
        }
    }
}

/// Runs commands on behalf of one session.
pub struct Orchestrator<'a> {
    cwd: &'a Path,
    env: &'a Environment,
    job: &'a JobSlot,
}

impl<'a> Orchestrator<'a> {
    pub fn new(cwd: &'a Path, env: &'a Environment, job: &'a JobSlot) -> Self {
        Self { cwd, env, job }
    }

    /// Run one program and wait for it.
    ///
    /// Without an output redirection, stdout and stderr are merged and
    /// appended to `log` line by line. With one, both streams go to the file
    /// and nothing is captured. The child's pid occupies the session's job
    /// slot while it runs. A child stopped by SIGTSTP is left behind and
    /// whatever it wrote so far is dropped.
    pub fn run_simple(&self, cmd: &SimpleCommand, log: &mut OutputLog) -> Result<JobEnd, ExecError> {
        let program = self.resolve(&cmd.stage)?;

        let stdin = match &cmd.input {
            Some(path) => File::open(path)
                .map(Stdio::from)
                .map_err(|source| ExecError::OpenInput {
                    path: path.clone(),
                    source,
                })?,
            None => Stdio::null(),
        };

        let (stdout, stderr, capture) = match &cmd.output {
            Some(path) => {
                let (stdout, stderr) = open_output(path)?;
                (stdout, stderr, None)
            }
            None => {
                let (reader, writer) = io::pipe().map_err(ExecError::Pipe)?;
                let (stdout, stderr) = merged(writer)?;
                (stdout, stderr, Some(reader))
            }
        };

        let mut child = self.spawn(&program, &cmd.stage, stdin, stdout, stderr)?;
        let pid = child.id();
        self.job.set(pid);

        let reader = capture.map(|capture| thread::spawn(move || read_all(capture)));
        let waited = wait_foreground(&mut child);
        self.job.clear();

        let status = match waited.map_err(ExecError::Wait)? {
            Waited::Exited(status) => status,
            Waited::Stopped => {
                info!(program = %cmd.stage.program, pid, "foreground job stopped");
                return Ok(JobEnd::Stopped(pid));
            }
        };
        if let Some(reader) = reader {
            let bytes = reader
                .join()
                .map_err(|_| ExecError::Capture(io::Error::other("capture reader panicked")))??;
            log.push_text(&String::from_utf8_lossy(&bytes));
        }
        let code = exit_code(status);
        debug!(program = %cmd.stage.program, code, "command finished");
        Ok(JobEnd::Exited(code))
    }

    /// Run every stage concurrently, stage `i` reading what stage `i - 1`
    /// writes. Only the last stage's merged output reaches `log`.
    ///
    /// A stage whose program cannot be started writes the failure into its
    /// own output slot and counts as exited with 127 (not found) or 126;
    /// the other stages run regardless. Only a pipe failure aborts.
    pub fn run_pipeline(&self, pipeline: &Pipeline, log: &mut OutputLog) -> Result<Vec<ExitCode>, ExecError> {
        let (capture, capture_writer) = io::pipe().map_err(ExecError::Pipe)?;
        let last = pipeline.stages.len().saturating_sub(1);
        let mut runs: Vec<StageRun> = Vec::with_capacity(pipeline.stages.len());
        let mut upstream: Option<PipeReader> = None;

        for (i, stage) in pipeline.stages.iter().enumerate() {
            let stdin = upstream.take();
            let started = stage_writer(i == last, &capture_writer).and_then(|(writer, next)| {
                upstream = next;
                self.start_stage(stage, stdin, writer)
            });
            match started {
                Ok(run) => runs.push(run),
                Err(e) => {
                    drop(capture_writer);
                    reap(&mut runs);
                    return Err(e);
                }
            }
        }
        drop(capture_writer);

        let captured = read_all(capture);
        let codes = runs
            .iter_mut()
            .map(StageRun::wait)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ExecError::Wait);

        log.push_text(&String::from_utf8_lossy(&captured?));
        let codes = codes?;
        debug!(stages = codes.len(), ?codes, "pipeline finished");
        Ok(codes)
    }

    /// Start one pipeline stage writing into `writer`. Not finding or not
    /// being able to spawn the program is written into `writer` instead of
    /// being returned.
    fn start_stage(
        &self,
        stage: &Stage,
        stdin: Option<PipeReader>,
        mut writer: PipeWriter,
    ) -> Result<StageRun, ExecError> {
        let stdout = writer.try_clone().map_err(ExecError::Pipe)?;
        let stderr = writer.try_clone().map_err(ExecError::Pipe)?;
        let stdin = stdin.map_or_else(Stdio::null, Stdio::from);

        let spawned = self.resolve(stage).and_then(|program| {
            self.spawn(&program, stage, stdin, Stdio::from(stdout), Stdio::from(stderr))
        });
        match spawned {
            Ok(child) => Ok(StageRun::Running(child)),
            Err(e) => {
                debug!(program = %stage.program, "pipeline stage did not start: {e}");
                if let Err(write_err) = writeln!(writer, "{e}") {
                    debug!(program = %stage.program, "reporting stage failure failed: {write_err}");
                }
                let code = match e {
                    ExecError::NotFound { .. } => NOT_FOUND,
                    _ => NOT_EXECUTABLE,
                };
                Ok(StageRun::Failed(code))
            }
        }
    }

    fn resolve(&self, stage: &Stage) -> Result<PathBuf, ExecError> {
        resolve_program(&stage.program, self.cwd, self.env).ok_or_else(|| ExecError::NotFound {
            program: stage.program.clone(),
        })
    }

    fn spawn(
        &self,
        program: &Path,
        stage: &Stage,
        stdin: Stdio,
        stdout: Stdio,
        stderr: Stdio,
    ) -> Result<Child, ExecError> {
        spawn_stage(program, stage, self.cwd, self.env, [stdin, stdout, stderr])
    }
}

/// Run `stage` in `cwd` with stdout and stderr truncating `path` and the
/// null device as stdin. Used by watch supervisors for every re-run.
pub(crate) fn spawn_into_file(
    stage: &Stage,
    cwd: &Path,
    env: &Environment,
    path: &Path,
) -> Result<Child, ExecError> {
    let program = resolve_program(&stage.program, cwd, env).ok_or_else(|| ExecError::NotFound {
        program: stage.program.clone(),
    })?;
    let (stdout, stderr) = open_output(path)?;
    spawn_stage(&program, stage, cwd, env, [Stdio::null(), stdout, stderr])
}

/// Spawn one program with the given stdin, stdout and stderr. The `Command`
/// and the parent's copies of the pipe ends it holds are dropped on return.
fn spawn_stage(
    program: &Path,
    stage: &Stage,
    cwd: &Path,
    env: &Environment,
    [stdin, stdout, stderr]: [Stdio; 3],
) -> Result<Child, ExecError> {
    let child = Command::new(program)
        .args(&stage.args)
        .envs(&env.vars)
        .current_dir(cwd)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: stage.program.clone(),
            source,
        })?;
    info!(program = %program.display(), pid = child.id(), "spawned");
    Ok(child)
}

/// Stdout and stderr both writing into the same pipe.
fn merged(writer: PipeWriter) -> Result<(Stdio, Stdio), ExecError> {
    let dup = writer.try_clone().map_err(ExecError::Pipe)?;
    Ok((Stdio::from(writer), Stdio::from(dup)))
}

/// Write end for one pipeline stage, plus the read end the next stage
/// should use as its stdin.
fn stage_writer(
    is_last: bool,
    capture_writer: &PipeWriter,
) -> Result<(PipeWriter, Option<PipeReader>), ExecError> {
    if is_last {
        let writer = capture_writer.try_clone().map_err(ExecError::Pipe)?;
        Ok((writer, None))
    } else {
        let (reader, writer) = io::pipe().map_err(ExecError::Pipe)?;
        Ok((writer, Some(reader)))
    }
}

/// Truncate-create the redirection target (mode 0644) for stdout and stderr.
fn open_output(path: &Path) -> Result<(Stdio, Stdio), ExecError> {
    let err = |source| ExecError::OpenOutput {
        path: path.to_path_buf(),
        source,
    };
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    let file = options.open(path).map_err(err)?;
    let dup = file.try_clone().map_err(err)?;
    Ok((Stdio::from(file), Stdio::from(dup)))
}

fn read_all(mut reader: PipeReader) -> Result<Vec<u8>, ExecError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(ExecError::Capture)?;
    Ok(bytes)
}

fn reap(runs: &mut [StageRun]) {
    for run in runs {
        if let StageRun::Running(child) = run {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

enum Waited {
    Exited(ExitStatus),
    Stopped,
}

/// Wait for a foreground child, returning early if it is stopped.
#[cfg(unix)]
fn wait_foreground(child: &mut Child) -> io::Result<Waited> {
    use std::os::unix::process::ExitStatusExt;

    let pid = libc::pid_t::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: `status` is a valid, writable c_int for the whole call.
        let rc = unsafe { libc::waitpid(pid, &mut status, libc::WUNTRACED) };
        if rc == pid {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
    if libc::WIFSTOPPED(status) {
        Ok(Waited::Stopped)
    } else {
        Ok(Waited::Exited(ExitStatus::from_raw(status)))
    }
}

#[cfg(not(unix))]
fn wait_foreground(child: &mut Child) -> io::Result<Waited> {
    child.wait().map(Waited::Exited)
}
