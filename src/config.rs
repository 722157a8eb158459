use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds on the work spent looking for the best batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Maximum number of search nodes the exact selector may expand.
    pub work_limit: u64,
    /// Wall-clock limit for the exact selector.
    pub deadline: Option<Duration>,
    /// Batches with more valid candidates than this are selected greedily.
    pub max_exact_candidates: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            work_limit: 1_000_000,
            deadline: None,
            max_exact_candidates: 64,
        }
    }
}

impl HandlerConfig {
    pub fn with_work_limit(mut self, work_limit: u64) -> Self {
        self.work_limit = work_limit;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_exact_candidates(mut self, max_exact_candidates: usize) -> Self {
        self.max_exact_candidates = max_exact_candidates;
        self
    }
}
