use crate::config::ReconnectPolicy;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    RetryAfter(Duration),
    Exhausted,
}

/// Backoff bookkeeping for the signaling link.
#[derive(Debug, Clone)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Called for every unexpected close, including a failed reconnect.
    pub fn on_unexpected_close(&mut self) -> ReconnectDecision {
        if self.attempt >= self.policy.max_attempts {
            return ReconnectDecision::Exhausted;
        }
        let delay = self.policy.delay(self.attempt);
        self.attempt += 1;
        ReconnectDecision::RetryAfter(delay)
    }

    pub fn on_open(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
