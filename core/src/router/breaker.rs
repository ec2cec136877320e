//! Per-model circuit breaker.
//!
//! Plain state owned by the router's per-model entry; no interior locking
//! and no timers. The Open -> HalfOpen transition is evaluated lazily on
//! read, so a breaker left alone past its recovery timeout reports
//! available again the next time anyone asks. Probe budget is charged per
//! attempted call (`note_probe`), not per availability read, so a
//! half-open model that never gets attempted is not wedged unavailable.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// How long an open breaker rejects traffic before probing
    pub recovery_timeout: Duration,
    /// Probe calls allowed while half-open before a success is required
    pub half_open_max_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    half_open_probes_used: u32,
}

/// Read-only view exposed through the router's status surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub half_open_probes_used: u32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            half_open_probes_used: 0,
        }
    }

    /// Whether traffic may be sent to this model right now.
    pub fn is_available(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let recovered = self
                    .last_failure
                    .map(|at| at.elapsed() > self.config.recovery_timeout)
                    .unwrap_or(true);
                if !recovered {
                    return false;
                }
                self.state = BreakerState::HalfOpen;
                self.half_open_probes_used = 0;
                true
            }
            BreakerState::HalfOpen => {
                self.half_open_probes_used < self.config.half_open_max_probes
            }
        }
    }

    /// Charge one probe call against the half-open budget. No-op in other
    /// states; normal closed-state traffic is not probing.
    pub fn note_probe(&mut self) {
        if self.state == BreakerState::HalfOpen {
            self.half_open_probes_used += 1;
        }
    }

    pub fn record_success(&mut self) {
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.half_open_probes_used = 0;
        self.last_failure = None;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.last_failure = Some(Instant::now());
        match self.state {
            BreakerState::HalfOpen => {
                // Failed probe: back to open with a fresh recovery clock
                self.state = BreakerState::Open;
                self.half_open_probes_used = 0;
            }
            BreakerState::Closed => {
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.state = BreakerState::Open;
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            half_open_probes_used: self.half_open_probes_used,
        }
    }
}
