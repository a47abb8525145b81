//! Backend child process
//!
//! The shell owns the Python backend for its whole lifetime: it starts it
//! before any view can talk to it and stops it on exit. Output lines are
//! re-emitted as tracing events under the `backend` target.

use crate::backend::error::{BackendError, BackendResult};
use crate::config::BackendConfig;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Handle to a running backend process
#[derive(Debug)]
pub struct BackendProcess {
    child: Child,
}

impl BackendProcess {
    /// Launch `uvicorn` for the configured app from the backend directory
    pub fn spawn(config: &BackendConfig) -> BackendResult<Self> {
        let python = config.python_executable();
        let port = config.port.to_string();

        let mut command = Command::new(&python);
        command
            .args(["-m", "uvicorn", "app.main:app", "--host"])
            .arg(&config.host)
            .args(["--port", &port])
            .current_dir(&config.working_dir);

        tracing::info!(
            python = %python.display(),
            dir = %config.working_dir.display(),
            host = %config.host,
            port = config.port,
            "Starting backend"
        );

        Self::spawn_command(command).map_err(|source| BackendError::Spawn {
            program: python,
            source,
        })
    }

    fn spawn_command(mut command: Command) -> std::io::Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, Stream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, Stream::Stderr));
        }

        tracing::debug!(pid = ?child.id(), "Backend process spawned");
        Ok(Self { child })
    }

    /// OS process id, `None` once the process has been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Exit status if the process already stopped
    pub fn try_status(&mut self) -> BackendResult<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Ask the process to stop, then kill it if it is still running after `grace`.
    /// Returns immediately when the process has already exited.
    pub async fn terminate(&mut self, grace: Duration) -> BackendResult<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            tracing::debug!(%status, "Backend already exited");
            return Ok(status);
        }

        self.request_stop();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::info!(%status, "Backend stopped");
                Ok(status)
            }
            Err(_) => {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "Backend ignored stop request, killing");
                self.child.start_kill()?;
                let status = self.child.wait().await?;
                Ok(status)
            }
        }
    }

    #[cfg(unix)]
    fn request_stop(&self) {
        let Some(pid) = self.child.id() else {
            return;
        };
        // SAFETY: plain signal delivery to a pid we spawned and have not reaped
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            tracing::warn!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
        }
    }

    #[cfg(not(unix))]
    fn request_stop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!(error = %e, "Failed to stop backend");
        }
    }
}

async fn forward_lines<R>(reader: R, stream: Stream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                Stream::Stdout => tracing::info!(target: "backend", "{}", line),
                Stream::Stderr => tracing::warn!(target: "backend", "{}", line),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: "backend", error = %e, ?stream, "Output stream closed");
                break;
            }
        }
    }
}
