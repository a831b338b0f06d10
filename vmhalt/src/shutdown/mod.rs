//! Two-phase VM shutdown.
//!
//! ## Flow
//!
//! ```text
//! shutdown_command set?
//!   no  → driver.stop(vm)                                  (forceful)
//!   yes → deadline = now + shutdown_timeout                (graceful)
//!         executor.start(command)
//!         relay output lines until exit status ┐
//!                                   or deadline ┘
//!         exit != 0 → halt
//!         drain stdout, then stderr                        (until deadline)
//!         poll driver.is_running(vm) until off  or deadline
//! ```
//!
//! One deadline bounds the whole graceful attempt: waiting for the command
//! and waiting for power-off both count against it. If the command is still
//! running when the deadline passes it is abandoned and the VM gets one last
//! power-state check.

mod output;

use crate::config::ShutdownConfig;
use crate::driver::VmDriver;
use crate::exec::{ExitStatus, RemoteCommand, RemoteExecutor};
use crate::sink::OutputSink;
use crate::step::{Step, StepOutcome};
use crate::vm::VmHandle;
use async_trait::async_trait;
use output::{LineStream, WatchedCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tracing::Instrument;
use ulid::Ulid;
use vmhalt_shared::errors::{VmhaltError, VmhaltResult};

pub const GRACEFUL_HALT_MESSAGE: &str = "Gracefully halting virtual machine...";
pub const FORCEFUL_HALT_MESSAGE: &str = "Halting the virtual machine...";

// Roughly 30 years.
const FAR_FUTURE_SECS: u64 = 86400 * 365 * 30;

/// Result of a shutdown attempt.
pub type ShutdownOutcome = StepOutcome;

/// Everything one shutdown attempt needs.
pub struct ShutdownContext {
    pub vm: VmHandle,
    pub config: ShutdownConfig,
    pub executor: Arc<dyn RemoteExecutor>,
    pub driver: Arc<dyn VmDriver>,
    pub sink: Arc<dyn OutputSink>,
}

impl ShutdownContext {
    pub fn new(
        vm: VmHandle,
        config: ShutdownConfig,
        executor: Arc<dyn RemoteExecutor>,
        driver: Arc<dyn VmDriver>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            vm,
            config,
            executor,
            driver,
            sink,
        }
    }
}

/// Shut down `ctx.vm`.
///
/// Runs the guest command when one is configured, otherwise stops the VM
/// through the driver. Failures are reported to the sink once and returned
/// as the halt cause; nothing is retried.
pub async fn shutdown(ctx: &ShutdownContext) -> ShutdownOutcome {
    let span = tracing::info_span!("shutdown", vm = %ctx.vm, attempt_id = %Ulid::new());

    async {
        let result = match ctx.config.graceful_command() {
            Some(command) => graceful(ctx, command).await,
            None => forceful(ctx).await,
        };

        match result {
            Ok(()) => {
                tracing::info!("VM shut down.");
                StepOutcome::Continue
            }
            Err(err) => {
                tracing::error!(error = %err, "Shutdown failed");
                ctx.sink.error(&err.to_string());
                StepOutcome::Halt(err)
            }
        }
    }
    .instrument(span)
    .await
}

async fn forceful(ctx: &ShutdownContext) -> VmhaltResult<()> {
    ctx.sink.say(FORCEFUL_HALT_MESSAGE);

    ctx.driver
        .stop(&ctx.vm)
        .await
        .map_err(|e| VmhaltError::StopFailed(e.to_string()))
}

async fn graceful(ctx: &ShutdownContext, command: &str) -> VmhaltResult<()> {
    ctx.sink.say(GRACEFUL_HALT_MESSAGE);

    let deadline = deadline_after(ctx.config.shutdown_timeout);
    let command = RemoteCommand::new(command);

    tracing::info!(command = %command, "Executing shutdown command");
    let process = ctx
        .executor
        .start(&ctx.vm, &command)
        .await
        .map_err(|e| VmhaltError::StartCommandFailed(e.to_string()))?;

    tracing::info!(
        timeout = ?ctx.config.shutdown_timeout,
        "Waiting for shutdown to complete"
    );

    let mut watched = WatchedCommand::spawn(process);
    match relay_output(ctx, &mut watched, deadline).await? {
        CommandEnd::Exited(status) => {
            tracing::info!(exit_status = status, "Shutdown command exited");
            if status != 0 {
                return Err(VmhaltError::NonZeroExit(status));
            }

            // The exit status can win the race against buffered output. A
            // background child holding the pipes open is cut off at the deadline.
            let drained = tokio::time::timeout_at(deadline, async {
                drain(ctx, &mut watched.stdout).await;
                drain(ctx, &mut watched.stderr).await;
            })
            .await;
            if drained.is_err() {
                tracing::warn!("Deadline reached while draining shutdown command output");
            }
        }
        CommandEnd::DeadlineReached => {
            tracing::warn!("Deadline reached before shutdown command exited, abandoning it");
        }
    }
    drop(watched);

    wait_for_power_off(ctx, deadline).await
}

/// `now + timeout`, saturating far in the future for absurd timeouts.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

enum CommandEnd {
    Exited(ExitStatus),
    DeadlineReached,
}

/// Forward output lines until the command exits or the deadline passes.
async fn relay_output(
    ctx: &ShutdownContext,
    watched: &mut WatchedCommand,
    deadline: Instant,
) -> VmhaltResult<CommandEnd> {
    let mut stdout_done = false;
    let mut stderr_done = false;
    let deadline_sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(deadline_sleep);

    loop {
        tokio::select! {
            line = watched.stdout.next(), if !stdout_done => match line {
                Some(line) => ctx.sink.message(line.trim()),
                None => stdout_done = true,
            },
            line = watched.stderr.next(), if !stderr_done => match line {
                Some(line) => ctx.sink.message(line.trim()),
                None => stderr_done = true,
            },
            status = &mut watched.exit => {
                return status.map(CommandEnd::Exited).map_err(|_| {
                    VmhaltError::Internal("shutdown command watcher exited without a status".into())
                });
            }
            _ = &mut deadline_sleep => return Ok(CommandEnd::DeadlineReached),
        }
    }
}

async fn drain(ctx: &ShutdownContext, lines: &mut LineStream) {
    while let Some(line) = lines.next().await {
        ctx.sink.message(line.trim());
    }
}

/// Poll the driver until the VM is off.
///
/// Never sleeps past the deadline: the last sleep is cut short so one more
/// check happens right at it.
async fn wait_for_power_off(ctx: &ShutdownContext, deadline: Instant) -> VmhaltResult<()> {
    loop {
        if !vm_running(ctx).await {
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(VmhaltError::ShutdownTimeout);
        }

        let wake = now
            .checked_add(ctx.config.poll_interval)
            .map_or(deadline, |next| next.min(deadline));
        tokio::time::sleep_until(wake).await;
    }
}

/// A driver error counts as "still running" so it can never fake a power-off.
async fn vm_running(ctx: &ShutdownContext) -> bool {
    match ctx.driver.is_running(&ctx.vm).await {
        Ok(running) => running,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to query VM power state");
            true
        }
    }
}

/// Step adapter so a shutdown can run inside a [`StepRunner`](crate::step::StepRunner).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShutdownStep;

#[async_trait]
impl Step<ShutdownContext> for ShutdownStep {
    async fn run(&self, ctx: &ShutdownContext) -> StepOutcome {
        shutdown(ctx).await
    }

    fn name(&self) -> &str {
        "shutdown"
    }
}

// ============================================================================
// THREAD SAFETY ASSERTIONS
// ============================================================================

// Shutdown futures are spawned onto multi-threaded runtimes by callers.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<ShutdownContext>;
};
