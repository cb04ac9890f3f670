use serde::Serialize;

use crate::script::RunResult;

/// Aggregated report for a batch of script runs.
///
/// Built from a `Vec<RunResult>` via `from_results()`. Consumed by the
/// console and JSON reporters.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub suite_name: String,

    pub total: usize,
    pub passed: usize,
    pub failed: usize,

    /// Requested primitive actions across all runs
    pub actions: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,

    pub results: Vec<RunResult>,
}

impl RunReport {
    /// Build a report, computing the pass/fail counts.
    pub fn from_results(suite_name: &str, results: Vec<RunResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let actions = results.iter().map(|r| r.actions).sum();
        Self {
            suite_name: suite_name.to_string(),
            total,
            passed,
            failed: total - passed,
            actions,
            duration_ms: None,
            results,
        }
    }

    pub fn with_duration(mut self, duration_ms: u128) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
