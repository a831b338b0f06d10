//! Command execution on the guest.
//!
//! An executor starts a [`RemoteCommand`] and hands back a [`RemoteProcess`]:
//! two output readers plus a completion future that resolves to the exit
//! status exactly once. The exit status may resolve before the readers
//! reach EOF, e.g. when a background child inherited the command's output.

mod shell;

use crate::vm::VmHandle;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tokio::io::AsyncRead;
use vmhalt_shared::VmhaltResult;

pub use shell::{ShellExecutor, VM_ENV};

/// Exit status reported by a finished guest command.
pub type ExitStatus = i32;

/// Byte stream of command output.
pub type OutputReader = Pin<Box<dyn AsyncRead + Send>>;

/// Resolves once the command completes.
pub type ExitFuture = BoxFuture<'static, ExitStatus>;

/// Command text to run on the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    command: String,
}

impl RemoteCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.command
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)
    }
}

/// A started guest command.
pub struct RemoteProcess {
    stdout: OutputReader,
    stderr: OutputReader,
    exit: ExitFuture,
}

impl RemoteProcess {
    pub fn new<O, E, F>(stdout: O, stderr: E, exit: F) -> Self
    where
        O: AsyncRead + Send + 'static,
        E: AsyncRead + Send + 'static,
        F: Future<Output = ExitStatus> + Send + 'static,
    {
        Self {
            stdout: Box::pin(stdout),
            stderr: Box::pin(stderr),
            exit: Box::pin(exit),
        }
    }

    pub fn into_parts(self) -> (OutputReader, OutputReader, ExitFuture) {
        (self.stdout, self.stderr, self.exit)
    }
}

impl fmt::Debug for RemoteProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProcess").finish_non_exhaustive()
    }
}

/// Starts commands on a VM's guest.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Start `command` on `vm`.
    ///
    /// Returns once the command is running; an error means it never began.
    async fn start(&self, vm: &VmHandle, command: &RemoteCommand) -> VmhaltResult<RemoteProcess>;
}
