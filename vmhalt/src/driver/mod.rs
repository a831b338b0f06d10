//! Hypervisor-side control of a VM.
//!
//! ## Architecture
//!
//! - **VmDriver**: power-state queries and forceful stop, keyed by `VmHandle`
//! - **ProcessDriver**: reference driver where each VM is a hypervisor process
//!
//! The orchestrator only ever asks two questions of a driver: is the VM still
//! running, and stop it now. Everything else about the hypervisor stays
//! behind this trait.

mod process;

use crate::vm::VmHandle;
use async_trait::async_trait;
use vmhalt_shared::VmhaltResult;

pub use process::{ProcessDriver, is_process_alive, kill_process};

/// Runtime operations on a VM.
#[async_trait]
pub trait VmDriver: Send + Sync {
    /// Check whether the VM is still powered on.
    async fn is_running(&self, vm: &VmHandle) -> VmhaltResult<bool>;

    /// Stop the VM at the hypervisor level, bypassing the guest.
    ///
    /// Stopping a VM that is already off must succeed without doing anything.
    async fn stop(&self, vm: &VmHandle) -> VmhaltResult<()>;
}
