use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Bounded exponential backoff: `base * 2^attempt`, capped at one minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Whether another try is allowed after `attempt` failed tries.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(40), MAX_BACKOFF);
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }
}
