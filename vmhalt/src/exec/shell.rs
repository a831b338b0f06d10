//! Executor that runs commands through a local shell.
//!
//! The guest is reached through the command itself, for example
//! `ssh -o BatchMode=yes admin@10.0.0.5 sudo poweroff`.

use super::{ExitStatus, RemoteCommand, RemoteExecutor, RemoteProcess};
use crate::vm::VmHandle;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use vmhalt_shared::errors::{VmhaltError, VmhaltResult};

/// Environment variable carrying the target VM name into the command.
pub const VM_ENV: &str = "VMHALT_VM";

/// Exit status reported when the command was killed by a signal or could
/// not be waited on.
const UNKNOWN_EXIT_STATUS: ExitStatus = -1;

/// Spawns `<shell> -c <command>` with piped stdout and stderr.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: PathBuf,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("sh"),
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different shell binary (must accept `-c <command>`).
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl RemoteExecutor for ShellExecutor {
    async fn start(&self, vm: &VmHandle, command: &RemoteCommand) -> VmhaltResult<RemoteProcess> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command.as_str())
            .env(VM_ENV, vm.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Abandoned commands (deadline hit) must not outlive the attempt.
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            VmhaltError::Executor(format!(
                "failed to spawn {} for VM {}: {}",
                self.shell.display(),
                vm,
                e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VmhaltError::Internal("child stdout was not piped".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VmhaltError::Internal("child stderr was not piped".into()))?;

        tracing::debug!(vm = %vm, pid = ?child.id(), "Spawned shell command");

        let exit = async move {
            match child.wait().await {
                Ok(status) => status.code().unwrap_or(UNKNOWN_EXIT_STATUS),
                Err(e) => {
                    tracing::warn!("Failed to wait for shell command: {}", e);
                    UNKNOWN_EXIT_STATUS
                }
            }
        };

        Ok(RemoteProcess::new(stdout, stderr, exit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_runs_command_and_reports_exit() {
        let executor = ShellExecutor::new();
        let vm = VmHandle::new("vm-1");
        let process = executor
            .start(
                &vm,
                &RemoteCommand::new("echo \"$VMHALT_VM\"; echo oops >&2; exit 7"),
            )
            .await
            .unwrap();

        let (mut stdout, mut stderr, exit) = process.into_parts();
        let mut out = String::new();
        let mut err = String::new();
        stdout.read_to_string(&mut out).await.unwrap();
        stderr.read_to_string(&mut err).await.unwrap();

        assert_eq!(out, "vm-1\n");
        assert_eq!(err, "oops\n");
        assert_eq!(exit.await, 7);
    }

    #[tokio::test]
    async fn test_missing_shell_fails_to_start() {
        let executor = ShellExecutor::with_shell("/nonexistent/shell");
        let err = executor
            .start(&VmHandle::new("vm"), &RemoteCommand::new("true"))
            .await
            .unwrap_err();
        assert!(matches!(err, VmhaltError::Executor(_)));
    }
}
