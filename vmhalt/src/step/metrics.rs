//! Per-step timing collected by the runner.

/// Wall-clock time one step took to run.
#[derive(Debug, Clone)]
pub struct StepMetrics {
    pub name: String,
    pub duration_ms: u128,
}
