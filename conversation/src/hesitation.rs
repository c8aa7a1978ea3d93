//! Hesitation delay. Keeps fast hooks from answering in lockstep.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::debug;

use crate::config::HesitationConfig;

/// Pause granularity; delays are whole multiples of this.
const STEP_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct Hesitation {
    config: HesitationConfig,
}

impl Hesitation {
    pub fn new(config: HesitationConfig) -> Self {
        Self { config }
    }

    /// Delay to apply for a hook that started at `started`, if any.
    pub fn delay_for(&self, started: Instant) -> Option<Duration> {
        if !self.config.enabled || self.config.max_delay_ms < STEP_MS {
            return None;
        }
        if started.elapsed() >= self.config.threshold() {
            debug!("Skipping artificial wait");
            return None;
        }
        let steps = rand::thread_rng().gen_range(0..self.config.max_delay_ms / STEP_MS);
        Some(Duration::from_millis(steps * STEP_MS))
    }

    /// Sleep on the caller's task when the hook answered quickly.
    pub async fn hesitate(&self, started: Instant) {
        if let Some(delay) = self.delay_for(started) {
            debug!(delay_ms = delay.as_millis() as u64, "Hesitating before response");
            tokio::time::sleep(delay).await;
        }
    }
}
