use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::streams::StreamPair;

/// Default time a child gets to exit after SIGTERM before it is killed.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Parent-side streams of a spawned child: its stdout in, its stdin out.
pub type ChildStreams = StreamPair<ChildStdout, ChildStdin>;

/// A spawned child process speaking the protocol on its stdio.
///
/// The child's stderr is inherited so its logs reach the parent's stderr.
/// The process is killed if this handle is dropped without being
/// terminated.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    program: String,
}

impl ChildProcess {
    /// Spawn `program` with `args` and pipe its stdin/stdout.
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<(Self, ChildStreams)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command.args(args);
        Self::spawn_command(command)
    }

    /// Spawn a prepared command. Stdio settings on `command` are overridden.
    pub fn spawn_command(mut command: Command) -> Result<(Self, ChildStreams)> {
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            program: program.clone(),
            source,
        })?;

        let outbound = child
            .stdin
            .take()
            .ok_or(TransportError::MissingPipe("stdin"))?;
        let inbound = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;

        debug!(program = %program, pid = ?child.id(), "spawned child process");

        Ok((Self { child, program }, StreamPair::new(inbound, outbound)))
    }

    /// OS process id, or `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Program name the child was spawned from.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Wait for the child to exit on its own.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Non-blocking exit check.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Ask the child to exit, then kill it if it is still running after
    /// `grace`.
    ///
    /// On unix the request is SIGTERM. Elsewhere the child is killed
    /// immediately.
    pub async fn terminate(&mut self, grace: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(status);
        }

        self.request_exit()?;

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(program = %self.program, %status, "child exited");
                Ok(status)
            }
            Err(_) => {
                warn!(program = %self.program, ?grace, "child ignored termination request; killing");
                self.child.kill().await?;
                Ok(self.child.wait().await?)
            }
        }
    }

    #[cfg(unix)]
    fn request_exit(&mut self) -> Result<()> {
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = libc::pid_t::try_from(pid).map_err(|_| {
            TransportError::Io(std::io::Error::other(format!("pid {pid} out of range")))
        })?;

        // SAFETY: `pid` names a child this process spawned and has not reaped
        // (`id()` returns `None` after reaping), so the signal cannot reach an
        // unrelated process.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err.into());
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn request_exit(&mut self) -> Result<()> {
        Ok(self.child.start_kill()?)
    }
}
