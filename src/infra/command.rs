//! # Command Execution Module / 命令执行模块
//!
//! Spawns run-lines as child processes, captures their output and makes sure
//! nothing they started outlives them. On Unix every child leads its own
//! process group, so a timeout or an interrupt can kill the whole tree.
//!
//! 将运行行作为子进程派生，捕获其输出，并确保它们启动的任何进程都不会比它们存活得更久。
//! 在 Unix 上，每个子进程都领导自己的进程组，因此超时或中断可以终止整个进程树。

use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::config::Config;
use crate::core::execution::{CommandExit, CommandOutput, CommandRunner, RunContext};
use crate::infra::t;

/// How long output readers may keep draining after the process tree is gone.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Captured stdout and stderr of one process.
/// 一个进程捕获的 stdout 和 stderr。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs run-lines through the platform shell (`/bin/sh -c`, `cmd /C` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    /// Builds the child command for `command`: runs in the execution root with
    /// exactly the configured environment, no stdin, and its own process group.
    pub fn build_command(command: &str, config: &Config) -> tokio::process::Command {
        let mut cmd = if cfg!(windows) {
            let mut cmd = tokio::process::Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = tokio::process::Command::new("/bin/sh");
            cmd.arg("-c").arg(command);
            cmd
        };

        cmd.current_dir(&config.exec_root)
            .env_clear()
            .envs(&config.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, ctx: &RunContext<'_>) -> impl Future<Output = CommandOutput> + Send {
        let cmd = Self::build_command(command, ctx.config);
        async move {
            let (exit, output) = spawn_and_capture(cmd, ctx.deadline, ctx.cancel).await;
            let exit = exit.unwrap_or_else(|e| CommandExit::SpawnFailed(e.to_string()));
            CommandOutput {
                exit,
                stdout: output.stdout,
                stderr: output.stderr,
            }
        }
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    Deadline,
    Cancelled,
}

/// Spawns a command and captures its stdout and stderr while waiting for it.
/// Both streams are read concurrently. If `deadline` passes or `cancel` fires
/// first, the child's whole process group is killed.
///
/// # Arguments
/// * `cmd` - The `tokio::process::Command` to execute.
/// * `deadline` - Optional wall-clock deadline.
/// * `cancel` - Token signalling that the run is being aborted.
///
/// # Returns
/// A tuple containing:
/// - How the process ended, wrapped in an `io::Result` (spawn failures are errors).
/// - The captured stdout and stderr.
///
/// 派生一个命令，并在等待期间捕获其 stdout 和 stderr。
pub async fn spawn_and_capture(
    mut cmd: tokio::process::Command,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
) -> (std::io::Result<CommandExit>, CapturedOutput) {
    let mut child = match cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return (Err(e), CapturedOutput::default()),
    };
    let pid = child.id();

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        kill_tree(&mut child, pid).await;
        return (
            Err(std::io::Error::other(
                t!("command.capture_failed").to_string(),
            )),
            CapturedOutput::default(),
        );
    };

    let stdout_handle = tokio::spawn(read_all(stdout));
    let stderr_handle = tokio::spawn(read_all(stderr));

    let waited = tokio::select! {
        biased;
        status = child.wait() => Waited::Exited(status),
        _ = wait_for_deadline(deadline) => Waited::Deadline,
        _ = cancel.cancelled() => Waited::Cancelled,
    };

    let exit = match waited {
        Waited::Exited(status) => {
            // Background jobs left behind by the shell share its group.
            #[cfg(unix)]
            signal_group(pid);
            status.map(exit_from_status)
        }
        Waited::Deadline => {
            debug!(?pid, "deadline reached, killing process group");
            kill_tree(&mut child, pid).await;
            Ok(CommandExit::TimedOut)
        }
        Waited::Cancelled => {
            debug!(?pid, "run cancelled, killing process group");
            kill_tree(&mut child, pid).await;
            Ok(CommandExit::Cancelled)
        }
    };

    let stdout = join_reader(stdout_handle).await;
    let stderr = join_reader(stderr_handle).await;

    (exit, CapturedOutput { stdout, stderr })
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!("failed to read child output: {e}");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn join_reader(mut handle: tokio::task::JoinHandle<String>) -> String {
    match tokio::time::timeout(READER_GRACE, &mut handle).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("failed to join output reader: {e}");
            String::new()
        }
        Err(_) => {
            // Something outside the process group still holds the pipe.
            handle.abort();
            String::new()
        }
    }
}

fn exit_from_status(status: ExitStatus) -> CommandExit {
    #[cfg(unix)]
    let signaled = {
        use std::os::unix::process::ExitStatusExt;
        status.signal().is_some()
    };
    #[cfg(not(unix))]
    let signaled = false;

    CommandExit::Exited {
        code: status.code(),
        signaled,
    }
}

/// Kills the child's process group (Unix) and the child itself, then reaps it.
async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    signal_group(pid);
    if let Err(e) = child.kill().await {
        debug!(?pid, "failed to kill child: {e}");
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(errno) => debug!(pid = raw, "failed to kill process group: {errno}"),
    }
}
