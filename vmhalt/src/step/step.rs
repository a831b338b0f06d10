//! Step trait and outcome.

use async_trait::async_trait;
use vmhalt_shared::VmhaltError;

/// What the engine should do after a step has run.
#[derive(Debug)]
pub enum StepOutcome {
    /// Move on to the next step.
    Continue,
    /// Stop the run; the error is the cause.
    Halt(VmhaltError),
}

impl StepOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, StepOutcome::Continue)
    }

    pub fn error(&self) -> Option<&VmhaltError> {
        match self {
            StepOutcome::Continue => None,
            StepOutcome::Halt(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<(), VmhaltError> {
        match self {
            StepOutcome::Continue => Ok(()),
            StepOutcome::Halt(err) => Err(err),
        }
    }
}

/// A unit of work in a step run.
///
/// Steps share a context by reference; use interior mutability for writes.
#[async_trait]
pub trait Step<Ctx: Sync>: Send + Sync {
    /// Execute the step.
    async fn run(&self, ctx: &Ctx) -> StepOutcome;

    /// Undo or release whatever `run` set up. Called once for every step
    /// that ran, whether the run finished or halted.
    async fn cleanup(&self, _ctx: &Ctx) {}

    /// Human-readable step name for logging.
    fn name(&self) -> &str;
}

pub type BoxedStep<Ctx> = Box<dyn Step<Ctx>>;
