//! Cumulative per-model counters.
//!
//! Append-only: counters never decrease and cost is never corrected after
//! the fact. Snapshots are plain copies, so two reads with no intervening
//! traffic are identical.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    pub total_cost: f64,
}

impl ModelMetrics {
    pub fn record_success(&mut self, tokens_in: u32, tokens_out: u32, cost: f64) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_tokens_in += tokens_in as u64;
        self.total_tokens_out += tokens_out as u64;
        self.total_cost += cost;
    }

    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    /// Historical success rate used for primary-model selection.
    /// Models with no history are treated optimistically (1.0) so they get
    /// tried before anything with a known failure record.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}
