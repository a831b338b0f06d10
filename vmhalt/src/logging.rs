//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a log directory is given, to a daily-rolling
//! file as well. `RUST_LOG` overrides the default filter.

use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vmhalt_shared::errors::{VmhaltError, VmhaltResult};

const LOG_FILE_PREFIX: &str = "vmhalt.log";

/// Keeps the file writer flushing for the life of the process.
static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Directory for rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is unset.
    pub default_directive: String,
    /// Colored stderr output.
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            log_dir: None,
            default_directive: "info".to_string(),
            ansi: true,
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(options: &LoggingOptions) -> VmhaltResult<()> {
    let mut result = Ok(());
    LOG_GUARD.get_or_init(|| match install(options) {
        Ok(guard) => guard,
        Err(e) => {
            result = Err(e);
            None
        }
    });
    result
}

fn install(options: &LoggingOptions) -> VmhaltResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.default_directive))
        .map_err(|e| {
            VmhaltError::Config(format!(
                "invalid log filter '{}': {}",
                options.default_directive, e
            ))
        })?;

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(options.ansi)
                .with_target(true),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| VmhaltError::Internal(format!("failed to install log subscriber: {}", e)))?;

    Ok(guard)
}
