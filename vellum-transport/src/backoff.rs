//! Capped exponential backoff with jitter

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// After this many delays the backoff is exhausted and the caller must
    /// reconnect explicitly.
    pub max_attempts: u32,
    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
            jitter: true,
        }
    }
}

#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Next delay to wait, or `None` once the attempt cap is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }

        let exp = self.policy.base.as_millis() as f64
            * self.policy.multiplier.powi(self.attempt as i32);
        let capped = exp.min(self.policy.max_delay.as_millis() as f64);

        let mut delay = Duration::from_millis(capped as u64);
        if self.policy.jitter {
            let jitter_ms = (capped * fastrand::f64() * 0.1) as u64;
            delay += Duration::from_millis(jitter_ms);
        }

        self.attempt += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
