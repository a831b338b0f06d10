//! Output plumbing for a running shutdown command.
//!
//! ```text
//! RemoteProcess ──┬─ stdout ──pump──▶ pipe ──▶ line stream ─┐
//!                 ├─ stderr ──pump──▶ pipe ──▶ line stream ─┼─▶ orchestrator
//!                 └─ exit ───────────────────▶ oneshot ─────┘
//! ```
//!
//! The watcher task owns the process and both pipe writers. The exit status
//! is reported as soon as the command completes, while the pumps keep
//! copying. A pipe closes when its source reaches EOF, which can be long
//! after the exit when a background child inherited the command's output.
//! Readers of the line streams must bound their wait accordingly.

use crate::exec::{ExitFuture, ExitStatus, OutputReader, RemoteProcess};
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::SplitStream;
use tokio_stream::{Stream, StreamExt};

/// Bytes each pipe buffers before its pump waits for the reader.
const PIPE_CAPACITY: usize = 64 * 1024;

pub(super) type LineStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// A shutdown command under watch.
///
/// Dropping it aborts the watcher, which drops the process.
pub(super) struct WatchedCommand {
    pub(super) stdout: LineStream,
    pub(super) stderr: LineStream,
    pub(super) exit: oneshot::Receiver<ExitStatus>,
    watcher: JoinHandle<()>,
}

impl WatchedCommand {
    /// Spawn the completion watcher for `process`.
    pub(super) fn spawn(process: RemoteProcess) -> Self {
        let (stdout, stderr, exit) = process.into_parts();
        let (stdout_rx, stdout_tx) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_rx, stderr_tx) = tokio::io::duplex(PIPE_CAPACITY);
        let (exit_tx, exit_rx) = oneshot::channel();

        let watcher = tokio::spawn(watch(stdout, stderr, exit, stdout_tx, stderr_tx, exit_tx));

        Self {
            stdout: lines(stdout_rx, "stdout"),
            stderr: lines(stderr_rx, "stderr"),
            exit: exit_rx,
            watcher,
        }
    }
}

impl Drop for WatchedCommand {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

async fn watch(
    stdout: OutputReader,
    stderr: OutputReader,
    exit: ExitFuture,
    stdout_tx: DuplexStream,
    stderr_tx: DuplexStream,
    exit_tx: oneshot::Sender<ExitStatus>,
) {
    let report = async move {
        let status = exit.await;
        tracing::debug!(exit_status = status, "Shutdown command completed");

        // Receiver is gone only if the orchestrator already gave up on us.
        let _ = exit_tx.send(status);
    };

    tokio::join!(
        report,
        pump(stdout, stdout_tx, "stdout"),
        pump(stderr, stderr_tx, "stderr"),
    );
}

/// Copy `source` into the pipe, then close the pipe.
async fn pump(mut source: OutputReader, mut pipe: DuplexStream, stream: &'static str) {
    if let Err(e) = tokio::io::copy(&mut source, &mut pipe).await {
        tracing::warn!(stream, "Failed to relay command output: {}", e);
    }
    let _ = pipe.shutdown().await;
}

/// Decode a pipe into newline-delimited chunks.
///
/// The final chunk is yielded even without a trailing newline. Invalid UTF-8
/// is replaced rather than rejected.
fn lines(pipe: DuplexStream, stream: &'static str) -> LineStream {
    let chunks = SplitStream::new(BufReader::new(pipe).split(b'\n'));
    Box::pin(
        chunks
            .map_while(move |chunk| match chunk {
                Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => {
                    tracing::warn!(stream, "Failed to read command output: {}", e);
                    None
                }
            })
            .fuse(),
    )
}
