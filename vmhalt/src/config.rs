//! Shutdown configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vmhalt_shared::errors::{VmhaltError, VmhaltResult};

/// Default budget for the whole graceful attempt.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default pause between power-state checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a VM should be shut down.
///
/// An empty `shutdown_command` means there is no graceful path and the VM is
/// stopped through the driver directly.
///
/// Durations are written in humantime form:
///
/// ```json
/// { "shutdown_command": "sudo poweroff", "shutdown_timeout": "2m" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Command run inside the guest to power it off.
    pub shutdown_command: String,
    /// Deadline for the command to finish and the VM to power off.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Pause between `is_running` checks while waiting for power-off.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            shutdown_command: String::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ShutdownConfig {
    /// Config that runs `command` in the guest with the given budget.
    pub fn graceful(command: impl Into<String>, shutdown_timeout: Duration) -> Self {
        Self {
            shutdown_command: command.into(),
            shutdown_timeout,
            ..Self::default()
        }
    }

    /// Config with no guest command; the driver stops the VM directly.
    pub fn forceful() -> Self {
        Self::default()
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> VmhaltResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VmhaltError::Config(format!("invalid shutdown config: {}", e)))?;
        config.sanitize()
    }

    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> VmhaltResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VmhaltError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Validate and normalize.
    ///
    /// Trims the command so that a whitespace-only command selects the
    /// forceful path, and rejects zero durations.
    pub fn sanitize(mut self) -> VmhaltResult<Self> {
        self.shutdown_command = self.shutdown_command.trim().to_string();

        if self.shutdown_timeout.is_zero() {
            return Err(VmhaltError::Config(
                "shutdown_timeout must be greater than zero".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(VmhaltError::Config(
                "poll_interval must be greater than zero".into(),
            ));
        }

        Ok(self)
    }

    /// The guest command, if the graceful path is configured.
    pub fn graceful_command(&self) -> Option<&str> {
        let command = self.shutdown_command.trim();
        (!command.is_empty()).then_some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShutdownConfig::default();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(300));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.graceful_command().is_none());
    }

    #[test]
    fn test_from_json_humantime() {
        let config = ShutdownConfig::from_json(
            r#"{"shutdown_command": "  sudo poweroff ", "shutdown_timeout": "2m 30s"}"#,
        )
        .unwrap();
        assert_eq!(config.shutdown_command, "sudo poweroff");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(150));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.graceful_command(), Some("sudo poweroff"));
    }

    #[test]
    fn test_whitespace_command_is_forceful() {
        let config = ShutdownConfig::graceful("   ", Duration::from_secs(10));
        assert!(config.graceful_command().is_none());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ShutdownConfig::from_json(r#"{"shutdown_timeout": "0s"}"#).unwrap_err();
        assert!(matches!(err, VmhaltError::Config(_)));
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let err = ShutdownConfig::from_json(r#"{"shutdown_timeout": "soon"}"#).unwrap_err();
        assert!(matches!(err, VmhaltError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shutdown.json");
        std::fs::write(&path, r#"{"shutdown_command": "halt", "poll_interval": "250ms"}"#)
            .unwrap();

        let config = ShutdownConfig::load(&path).unwrap();
        assert_eq!(config.graceful_command(), Some("halt"));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ShutdownConfig::load(Path::new("/nonexistent/vmhalt.json")).unwrap_err();
        assert!(matches!(err, VmhaltError::Config(_)));
    }
}
