//! VM identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for the VM being shut down.
///
/// Owned by the caller and handed by reference to every driver and executor
/// call. The orchestrator never interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmHandle(String);

impl VmHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VmHandle {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for VmHandle {
    fn from(name: String) -> Self {
        Self(name)
    }
}
