//! Driver for VMs that run as a local hypervisor process.
//!
//! A VM is registered with the PID of its hypervisor process (QEMU, a
//! Firecracker jailer, a shim). Power state is the liveness of that process
//! and a forceful stop is SIGKILL.

use super::VmDriver;
use crate::vm::VmHandle;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use vmhalt_shared::errors::{VmhaltError, VmhaltResult};

/// Kill a process with SIGKILL.
///
/// # Returns
/// * `true` - Process was killed or doesn't exist
/// * `false` - Failed to kill (permission denied), or `pid` does not name a
///   single process
pub fn kill_process(pid: u32) -> bool {
    if !is_single_pid(pid) {
        return false;
    }
    unsafe { libc::kill(pid as i32, libc::SIGKILL) == 0 || !is_process_alive(pid) }
}

/// Check if a process with the given PID exists.
///
/// Uses `libc::kill(pid, 0)` which sends a null signal to check existence.
/// A process we may not signal (`EPERM`) still exists.
///
/// # Returns
/// * `true` - Process exists
/// * `false` - Process does not exist
pub fn is_process_alive(pid: u32) -> bool {
    if !is_single_pid(pid) {
        return false;
    }
    if unsafe { libc::kill(pid as i32, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

// PID 0 and anything that wraps negative address process groups, not a process.
fn is_single_pid(pid: u32) -> bool {
    pid != 0 && pid <= i32::MAX as u32
}

/// Maps VMs to hypervisor PIDs.
///
/// VMs that were never registered are reported as not running, and stopping
/// them is a no-op.
#[derive(Debug, Default)]
pub struct ProcessDriver {
    pids: RwLock<HashMap<VmHandle, u32>>,
}

impl ProcessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `vm` as the hypervisor process `pid`.
    pub fn register(&self, vm: VmHandle, pid: u32) {
        tracing::debug!(vm = %vm, pid, "Registered VM process");
        self.pids.write().insert(vm, pid);
    }

    /// Stop tracking `vm`. Returns the PID it was registered with.
    pub fn forget(&self, vm: &VmHandle) -> Option<u32> {
        self.pids.write().remove(vm)
    }

    pub fn pid(&self, vm: &VmHandle) -> Option<u32> {
        self.pids.read().get(vm).copied()
    }
}

#[async_trait]
impl VmDriver for ProcessDriver {
    async fn is_running(&self, vm: &VmHandle) -> VmhaltResult<bool> {
        Ok(self.pid(vm).is_some_and(is_process_alive))
    }

    async fn stop(&self, vm: &VmHandle) -> VmhaltResult<()> {
        let Some(pid) = self.pid(vm) else {
            tracing::debug!(vm = %vm, "VM not registered, nothing to stop");
            return Ok(());
        };

        if !is_process_alive(pid) {
            tracing::debug!(vm = %vm, pid, "VM process already gone");
            return Ok(());
        }

        if !kill_process(pid) {
            return Err(VmhaltError::Driver(format!(
                "failed to kill VM process {} (permission denied)",
                pid
            )));
        }

        tracing::info!(vm = %vm, pid, "Sent SIGKILL to VM process");
        Ok(())
    }
}
