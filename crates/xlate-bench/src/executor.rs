//! External command execution.

use crate::model::Outcome;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs one command line in a working directory.
///
/// Implementations never fail: non-zero exits, spawn errors and timeouts
/// are all reported as a failed [`Outcome`].
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str, working_dir: &Path, timeout: Option<Duration>) -> Outcome;
}

/// Executes commands through a POSIX shell (`sh -c <command>`).
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different shell binary; it is invoked as `<shell> -c <command>`.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str, working_dir: &Path, timeout: Option<Duration>) -> Outcome {
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        debug!(command, dir = %working_dir.display(), "spawning command");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The shell leads a fresh process group so a timeout can take down
        // everything it started, not just the shell itself.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command, dir = %working_dir.display(), error = %e, "failed to spawn command");
                return Outcome::spawn_failure(e).with_duration(elapsed_ms(start));
            }
        };

        let stdout = child.stdout.take().map(|pipe| tokio::spawn(drain(pipe)));
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(drain(pipe)));

        let status = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(command, timeout = ?limit, "command timed out");
                    kill_process_group(&mut child).await;
                    let stdout = collect(stdout).await;
                    let stderr = collect(stderr).await;
                    return Outcome::timeout(limit, stdout, stderr).with_duration(elapsed_ms(start));
                }
            },
            None => child.wait().await,
        };

        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;

        let outcome = match status {
            Ok(status) if status.success() => Outcome::passed(stdout, stderr),
            Ok(status) => Outcome::failed(status.code(), stdout, stderr),
            Err(e) => Outcome::failed(None, stdout, format!("failed to wait for command: {e}")),
        };
        outcome.with_duration(elapsed_ms(start))
    }
}

/// How long captured output may keep draining once the command is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

async fn drain<R: AsyncRead + Unpin>(mut pipe: R) -> Vec<u8> {
    let mut buf = Vec::new();
    // A read error keeps whatever arrived before it.
    let _ = pipe.read_to_end(&mut buf).await;
    buf
}

async fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    match tokio::time::timeout(DRAIN_GRACE, &mut reader).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            debug!(error = %e, "output reader failed");
            String::new()
        }
        Err(_) => {
            // Something outside the process group still holds the pipe open.
            reader.abort();
            String::new()
        }
    }
}

/// SIGKILL the child's whole process group, then reap the child.
async fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let ret = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if ret == -1 {
            debug!(pid, error = %std::io::Error::last_os_error(), "failed to kill process group");
        }
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "failed to reap timed out command");
    }
}
