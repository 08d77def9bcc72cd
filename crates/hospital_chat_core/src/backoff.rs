//! crates/hospital_chat_core/src/backoff.rs
//!
//! One reusable backoff schedule for the gateway's polling stages.

use std::time::Duration;

/// A delay-growth rule: initial delay, per-step multiplier, and a hard cap.
///
/// The gateway keeps the current delay itself and asks the policy how to grow
/// it; the progress and error growth rates of the status stage share one
/// current delay with different policies.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub const fn new(
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
            max_attempts,
        }
    }

    /// Grows a delay by the multiplier, capped at `max_delay`.
    pub fn grow(&self, current: Duration) -> Duration {
        let next = current.mul_f64(self.multiplier);
        next.min(self.max_delay)
    }
}
