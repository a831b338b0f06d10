//! Sequential step engine.
//!
//! Runs a list of steps against a shared context until one of them halts,
//! then unwinds by calling `cleanup` on every step that ran, newest first.
//!
//! ## Architecture
//!
//! ```text
//! StepRunner → Step → StepOutcome
//!
//! - StepRunner: runs steps in order and collects timings
//! - Step: one unit of work with an optional cleanup
//! - StepOutcome: Continue to the next step, or Halt with the cause
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use vmhalt::step::{Step, StepRunner};
//!
//! let steps: Vec<Box<dyn Step<ShutdownContext>>> = vec![Box::new(ShutdownStep)];
//! let report = StepRunner::run(&steps, &ctx).await;
//! if let Some(err) = report.error() {
//!     eprintln!("{} halted: {}", report.halted_at.unwrap_or_default(), err);
//! }
//! ```

mod metrics;
mod runner;
#[allow(clippy::module_inception)]
mod step;

pub use metrics::StepMetrics;
pub use runner::{StepReport, StepRunner};
pub use step::{BoxedStep, Step, StepOutcome};
