//! Per-model request rate window.
//!
//! Fixed window, reset lazily when queried past its boundary. Counts every
//! attempt, not only successes, and is independent of the circuit breaker.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 60,
        }
    }
}

#[derive(Debug)]
pub struct RateWindow {
    config: RateLimitConfig,
    request_count: u32,
    window_started: Instant,
}

impl RateWindow {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            request_count: 0,
            window_started: Instant::now(),
        }
    }

    fn roll_window(&mut self) {
        if self.window_started.elapsed() >= self.config.window {
            self.request_count = 0;
            self.window_started = Instant::now();
        }
    }

    pub fn is_limited(&mut self) -> bool {
        self.roll_window();
        self.request_count >= self.config.max_requests
    }

    /// Count one attempt against the current window.
    pub fn record_attempt(&mut self) {
        self.roll_window();
        self.request_count += 1;
    }

    #[cfg(test)]
    pub fn request_count(&self) -> u32 {
        self.request_count
    }
}
