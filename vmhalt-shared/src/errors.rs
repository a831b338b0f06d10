//! Error taxonomy for VM shutdown.
//!
//! The first four variants are the terminal failures of a shutdown attempt.
//! Each one is reported to the output sink exactly once and becomes the cause
//! of a halted step. The remaining variants are raised by collaborators
//! (executors, drivers, configuration) and get wrapped into one of the
//! terminal variants before they leave the orchestrator.

use thiserror::Error;

pub type VmhaltResult<T> = Result<T, VmhaltError>;

#[derive(Debug, Error)]
pub enum VmhaltError {
    /// The shutdown command could not be started on the guest.
    #[error("Failed to send shutdown command: {0}")]
    StartCommandFailed(String),

    /// The shutdown command ran and reported failure.
    #[error("Shutdown command exited with non-zero exit status: {0}")]
    NonZeroExit(i32),

    /// The hypervisor rejected a forceful stop.
    #[error("Error stopping VM: {0}")]
    StopFailed(String),

    /// The VM was still running when the deadline passed.
    #[error("Timeout while waiting for machine to shut down.")]
    ShutdownTimeout,

    #[error("executor error: {0}")]
    Executor(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VmhaltError {
    /// Whether this error is one of the terminal shutdown failures.
    pub fn is_shutdown_failure(&self) -> bool {
        matches!(
            self,
            VmhaltError::StartCommandFailed(_)
                | VmhaltError::NonZeroExit(_)
                | VmhaltError::StopFailed(_)
                | VmhaltError::ShutdownTimeout
        )
    }
}
