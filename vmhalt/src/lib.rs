//! Bounded two-phase VM shutdown.
//!
//! Given a running VM, vmhalt first tries a graceful shutdown by running a
//! command inside the guest and waiting for the VM to power off, all within
//! one time budget. With no command configured it stops the VM forcefully
//! through the hypervisor driver instead.
//!
//! ## Modules
//!
//! - `shutdown`: the orchestrator and its step adapter
//! - `exec`: guest command execution (`RemoteExecutor`, `ShellExecutor`)
//! - `driver`: hypervisor power control (`VmDriver`, `ProcessDriver`)
//! - `sink`: user-facing output (`OutputSink` and implementations)
//! - `step`: sequential step engine with cleanup
//! - `config`: `ShutdownConfig`
//! - `logging`: tracing subscriber setup
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn example() -> vmhalt::VmhaltResult<()> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vmhalt::{ConsoleSink, ProcessDriver, ShellExecutor, ShutdownConfig, ShutdownContext, VmHandle};
//!
//! let vm = VmHandle::new("builder-vm");
//! let driver = Arc::new(ProcessDriver::new());
//! driver.register(vm.clone(), 4242);
//!
//! let ctx = ShutdownContext::new(
//!     vm,
//!     ShutdownConfig::graceful("ssh admin@10.0.0.5 sudo poweroff", Duration::from_secs(120)),
//!     Arc::new(ShellExecutor::new()),
//!     driver,
//!     Arc::new(ConsoleSink::new()),
//! );
//!
//! vmhalt::shutdown(&ctx).await.into_result()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod exec;
pub mod logging;
pub mod shutdown;
pub mod sink;
pub mod step;
pub mod vm;

pub use config::ShutdownConfig;
pub use driver::{ProcessDriver, VmDriver};
pub use exec::{RemoteCommand, RemoteExecutor, RemoteProcess, ShellExecutor};
pub use logging::{LoggingOptions, init_logging};
pub use shutdown::{ShutdownContext, ShutdownOutcome, ShutdownStep, shutdown};
pub use sink::{ConsoleSink, MemorySink, OutputSink, SinkEvent, TracingSink};
pub use step::{Step, StepOutcome, StepReport, StepRunner};
pub use vm::VmHandle;
pub use vmhalt_shared::{VmhaltError, VmhaltResult};
