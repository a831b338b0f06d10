//! Step execution loop.

use super::metrics::StepMetrics;
use super::step::{BoxedStep, StepOutcome};
use std::time::Instant;
use vmhalt_shared::VmhaltError;

/// Result of a step run.
#[derive(Debug)]
pub struct StepReport {
    /// `Continue` if every step continued, otherwise the halting outcome.
    pub outcome: StepOutcome,
    /// Name of the step that halted the run.
    pub halted_at: Option<String>,
    pub total_duration_ms: u128,
    /// Timings of the steps that ran, in run order.
    pub steps: Vec<StepMetrics>,
}

impl StepReport {
    pub fn error(&self) -> Option<&VmhaltError> {
        self.outcome.error()
    }

    pub fn step_duration_ms(&self, name: &str) -> Option<u128> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .map(|step| step.duration_ms)
    }
}

pub struct StepRunner;

impl StepRunner {
    /// Run `steps` in order against `ctx`.
    ///
    /// Stops at the first step that halts. Afterwards every step that ran
    /// (including the halting one) is cleaned up in reverse order.
    pub async fn run<Ctx: Sync>(steps: &[BoxedStep<Ctx>], ctx: &Ctx) -> StepReport {
        let total_start = Instant::now();
        let mut metrics = Vec::with_capacity(steps.len());
        let mut outcome = StepOutcome::Continue;
        let mut halted_at = None;
        let mut ran = 0;

        for step in steps {
            let name = step.name().to_string();
            tracing::debug!(step = %name, "Running step");

            let step_start = Instant::now();
            let step_outcome = step.run(ctx).await;
            metrics.push(StepMetrics {
                name: name.clone(),
                duration_ms: step_start.elapsed().as_millis(),
            });
            ran += 1;

            if let StepOutcome::Halt(err) = step_outcome {
                tracing::warn!(step = %name, error = %err, "Step halted");
                outcome = StepOutcome::Halt(err);
                halted_at = Some(name);
                break;
            }
        }

        for step in steps[..ran].iter().rev() {
            tracing::trace!(step = step.name(), "Cleaning up step");
            step.cleanup(ctx).await;
        }

        StepReport {
            outcome,
            halted_at,
            total_duration_ms: total_start.elapsed().as_millis(),
            steps: metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn push(&self, entry: String) {
            self.entries.lock().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.entries.lock().clone()
        }
    }

    struct Recorded {
        name: &'static str,
        halt: bool,
    }

    #[async_trait]
    impl Step<Journal> for Recorded {
        async fn run(&self, ctx: &Journal) -> StepOutcome {
            ctx.push(format!("run {}", self.name));
            if self.halt {
                StepOutcome::Halt(VmhaltError::ShutdownTimeout)
            } else {
                StepOutcome::Continue
            }
        }

        async fn cleanup(&self, ctx: &Journal) {
            ctx.push(format!("cleanup {}", self.name));
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn step(name: &'static str, halt: bool) -> BoxedStep<Journal> {
        Box::new(Recorded { name, halt })
    }

    #[tokio::test]
    async fn test_all_steps_continue() {
        let journal = Journal::default();
        let steps = vec![step("a", false), step("b", false)];

        let report = StepRunner::run(&steps, &journal).await;

        assert!(report.outcome.is_continue());
        assert!(report.halted_at.is_none());
        assert_eq!(report.steps.len(), 2);
        assert!(report.step_duration_ms("b").is_some());
        assert_eq!(
            journal.entries(),
            vec!["run a", "run b", "cleanup b", "cleanup a"]
        );
    }

    #[tokio::test]
    async fn test_halt_skips_remaining_steps() {
        let journal = Journal::default();
        let steps = vec![step("a", false), step("b", true), step("c", false)];

        let report = StepRunner::run(&steps, &journal).await;

        assert!(matches!(report.error(), Some(VmhaltError::ShutdownTimeout)));
        assert_eq!(report.halted_at.as_deref(), Some("b"));
        assert!(report.step_duration_ms("c").is_none());
        assert_eq!(
            journal.entries(),
            vec!["run a", "run b", "cleanup b", "cleanup a"]
        );
    }
}
