use crate::config::ClientConfig;
use std::time::Duration;

/// Fixed-attempt retry with a per-attempt timeout.
///
/// Every attempt re-sends the identical datagram: same authenticator, same
/// Proxy-State, so server-side duplicate detection can absorb retransmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            timeout,
        }
    }

    /// Single attempt, no retries.
    pub fn once(timeout: Duration) -> Self {
        RetryPolicy::new(1, timeout)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_secs(3))
    }
}

impl From<&ClientConfig> for RetryPolicy {
    fn from(config: &ClientConfig) -> Self {
        RetryPolicy::new(config.max_attempts, config.timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).max_attempts, 1);
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig {
            max_attempts: 5,
            timeout_ms: 250,
            ..ClientConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.timeout, Duration::from_millis(250));
    }
}
