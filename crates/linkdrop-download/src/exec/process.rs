//! External process adapter.
//!
//! Spawns a downloader, merges its stdout and stderr into one line stream and
//! terminates it on request with SIGTERM, escalating to SIGKILL after a grace
//! period.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

use super::command::CommandSpec;

/// Buffered lines between the pipe readers and the consumer.
const LINE_BUFFER: usize = 256;

/// Errors from spawning or supervising a process.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Process I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Whether `cancel` was called before the process exited.
    pub cancelled: bool,
}

impl ExitOutcome {
    fn from_status(status: ExitStatus, cancelled: bool) -> Self {
        Self {
            code: status.code(),
            cancelled,
        }
    }

    /// Exited with status 0 and was not cancelled.
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0)) && !self.cancelled
    }
}

/// Spawns command plans.
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    cancel_grace: Duration,
}

impl ProcessAdapter {
    pub const fn new(cancel_grace: Duration) -> Self {
        Self { cancel_grace }
    }

    /// Start a process with piped output.
    pub fn start(&self, spec: &CommandSpec) -> Result<RunningProcess, ProcessError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PYTHONUNBUFFERED", "1")
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.display().to_string(),
            source,
        })?;

        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        }

        tracing::debug!(pid = ?child.id(), command = %spec.describe(), "Spawned downloader");

        Ok(RunningProcess {
            child,
            lines: rx,
            cancel_grace: self.cancel_grace,
            cancelled: false,
            exited: None,
        })
    }
}

/// A spawned process and its merged output.
pub struct RunningProcess {
    child: Child,
    lines: mpsc::Receiver<String>,
    cancel_grace: Duration,
    cancelled: bool,
    exited: Option<ExitOutcome>,
}

impl RunningProcess {
    /// Next output line from stdout or stderr. `None` once both pipes closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> Result<ExitOutcome, ProcessError> {
        if let Some(outcome) = self.exited {
            return Ok(outcome);
        }
        let status = self.child.wait().await?;
        let outcome = ExitOutcome::from_status(status, self.cancelled);
        self.exited = Some(outcome);
        Ok(outcome)
    }

    /// Terminate the process: SIGTERM, then SIGKILL after the grace period.
    ///
    /// Idempotent; after a natural exit this only returns the recorded outcome.
    pub async fn cancel(&mut self) -> Result<ExitOutcome, ProcessError> {
        if let Some(outcome) = self.exited {
            return Ok(outcome);
        }
        if let Some(status) = self.child.try_wait()? {
            let outcome = ExitOutcome::from_status(status, self.cancelled);
            self.exited = Some(outcome);
            return Ok(outcome);
        }

        self.cancelled = true;
        let status = terminate(&mut self.child, self.cancel_grace).await?;
        let outcome = ExitOutcome::from_status(status, true);
        self.exited = Some(outcome);
        Ok(outcome)
    }
}

#[cfg(unix)]
async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        return child.wait().await;
    };
    let pid = i32::try_from(pid).map_err(io::Error::other)?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        // Already gone
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    tracing::warn!(pid, ?grace, "Downloader ignored SIGTERM, sending SIGKILL");
    child.kill().await?;
    child.wait().await
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _grace: Duration) -> io::Result<ExitStatus> {
    child.kill().await?;
    child.wait().await
}

/// Read a pipe and forward its lines. Carriage returns split lines too, since
/// progress bars redraw in place.
async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                for segment in buf.split(|b| *b == b'\n' || *b == b'\r') {
                    if segment.is_empty() {
                        continue;
                    }
                    let line = String::from_utf8_lossy(segment).into_owned();
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Output pipe read failed");
                break;
            }
        }
    }
}
