//! External command execution.
//!
//! Commands are shell strings (`turbo run build`, `cd apps/web && pnpm run dev`)
//! so they go through the platform shell.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::DevtoolsConfig;
use crate::error::{DevtoolsError, Result};

#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    max_output_bytes: usize,
}

impl CommandRunner {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    pub fn from_config(config: &DevtoolsConfig) -> Self {
        Self::new(config.command_timeout(), config.max_output_bytes)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` in `cwd` and collect its output.
    ///
    /// On success returns stdout, or stderr when stdout is empty. A non-zero
    /// exit is an `ExternalCommand` error carrying stderr when there is any.
    /// Output is read as it arrives; the command and everything it started
    /// are killed once either stream passes the cap or the timeout elapses.
    pub async fn run_with_output(&self, command: &str, cwd: &Path) -> Result<String> {
        debug!("Running `{}` in {}", command, cwd.display());

        let mut cmd = shell_command(command);
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            DevtoolsError::ExternalCommand(format!("Failed to execute command: {}", e))
        })?;
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let max = self.max_output_bytes;
        let collected = timeout(self.timeout, async {
            tokio::try_join!(
                read_capped(stdout, max),
                read_capped(stderr, max),
                async { child.wait().await.map_err(DevtoolsError::from) },
            )
        })
        .await;

        let (stdout, stderr, status) = match collected {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => {
                warn!("`{}` aborted: {}", command, e);
                terminate(&mut child, pid).await;
                return Err(e);
            }
            Err(_) => {
                warn!("`{}` timed out after {:?}", command, self.timeout);
                terminate(&mut child, pid).await;
                return Err(DevtoolsError::CommandTimeout(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if !status.success() {
            warn!("`{}` failed: {}", command, status);
            if !stderr.trim().is_empty() {
                return Err(DevtoolsError::ExternalCommand(stderr));
            }
            return Err(DevtoolsError::ExternalCommand(format!(
                "Command failed: {} ({})",
                command, status
            )));
        }

        if stdout.is_empty() {
            Ok(stderr)
        } else {
            Ok(stdout)
        }
    }

    /// Start `command` in `cwd` and return without waiting.
    ///
    /// Output lines are forwarded to the log so stdout stays free for
    /// protocol traffic.
    pub fn spawn(&self, command: &str, cwd: &Path) -> Result<()> {
        let mut cmd = shell_command(command);
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            DevtoolsError::ExternalCommand(format!("Failed to execute command: {}", e))
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(command.to_string(), stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(command.to_string(), stderr));
        }

        let command = command.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!("`{}` finished", command),
                Ok(status) => warn!("`{}` exited with {}", command, status),
                Err(e) => warn!("`{}` could not be awaited: {}", command, e),
            }
        });

        Ok(())
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::from_config(&DevtoolsConfig::default())
    }
}

/// Read `stream` to the end, failing as soon as it passes `max` bytes
async fn read_capped<R>(stream: Option<R>, max: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(stream) = stream {
        stream.take(max as u64 + 1).read_to_end(&mut buf).await?;
    }

    if buf.len() > max {
        return Err(DevtoolsError::ExternalCommand(format!(
            "Command output exceeded {} bytes",
            max
        )));
    }
    Ok(buf)
}

/// Kill the shell and every process in its group, then reap the shell
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) {
        // SAFETY: the child was spawned as leader of its own process group,
        // so a negative pid addresses only that group.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.start_kill() {
        debug!("Child already exited: {}", e);
    }
    if let Err(e) = child.wait().await {
        debug!("Could not reap child: {}", e);
    }
}

async fn forward_lines<R>(command: String, stream: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!("[{}] {}", command, line);
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner() -> CommandRunner {
        CommandRunner::new(Duration::from_secs(5), 1024)
    }

    #[tokio::test]
    async fn test_collects_stdout() {
        let dir = TempDir::new().unwrap();
        let output = runner().run_with_output("echo hello", dir.path()).await.unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let output = runner().run_with_output("ls", dir.path()).await.unwrap();
        assert!(output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_stderr_when_stdout_empty() {
        let dir = TempDir::new().unwrap();
        let output = runner()
            .run_with_output("echo warning >&2", dir.path())
            .await
            .unwrap();
        assert_eq!(output.trim(), "warning");
    }

    #[tokio::test]
    async fn test_failure_prefers_stderr() {
        let dir = TempDir::new().unwrap();
        let err = runner()
            .run_with_output("echo broken >&2; exit 3", dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.to_string().trim(), "broken");
    }

    #[tokio::test]
    async fn test_failure_without_stderr() {
        let dir = TempDir::new().unwrap();
        let err = runner().run_with_output("exit 1", dir.path()).await.unwrap_err();
        assert!(err.to_string().starts_with("Command failed: exit 1"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let runner = CommandRunner::new(Duration::from_millis(200), 1024);
        let err = runner.run_with_output("sleep 5", dir.path()).await.unwrap_err();
        assert!(matches!(err, DevtoolsError::CommandTimeout(_)));
        assert_eq!(err.to_string(), "Command timed out after 0.2 seconds");
    }

    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        let dir = TempDir::new().unwrap();
        let runner = CommandRunner::new(Duration::from_millis(300), 1024);
        let err = runner
            .run_with_output("(sleep 1; touch marker); true", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DevtoolsError::CommandTimeout(_)));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_cap_stops_endless_output() {
        let dir = TempDir::new().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(20), 1024);

        let started = std::time::Instant::now();
        let err = runner.run_with_output("yes", dir.path()).await.unwrap_err();

        assert_eq!(err.to_string(), "Command output exceeded 1024 bytes");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_spawn_returns_immediately() {
        let dir = TempDir::new().unwrap();
        runner().spawn("sleep 1; echo later", dir.path()).unwrap();
        assert!(runner().spawn("true", dir.path()).is_ok());
    }

    #[tokio::test]
    async fn test_output_cap() {
        let dir = TempDir::new().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5), 8);
        let err = runner
            .run_with_output("echo this-is-longer-than-eight", dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeded 8 bytes"));
    }
}
