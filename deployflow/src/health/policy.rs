//! Health-check polling policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_attempts() -> u32 {
    10
}

fn default_interval_seconds() -> u64 {
    10
}

fn default_timeout_seconds() -> u64 {
    10
}

/// Attempt budget and spacing for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckPolicy {
    /// Attempts per target before it counts as down.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Seconds slept between attempts.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Whether TLS certificates are verified.
    #[serde(default)]
    pub verify_tls: bool,
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            interval_seconds: default_interval_seconds(),
            timeout_seconds: default_timeout_seconds(),
            verify_tls: false,
        }
    }
}

impl HealthCheckPolicy {
    /// Sets the attempt budget.
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the spacing between attempts.
    #[must_use]
    pub const fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval_seconds = seconds;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Enables or disables TLS verification.
    #[must_use]
    pub const fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Spacing between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = HealthCheckPolicy::default();
        assert_eq!(policy.attempts, 10);
        assert_eq!(policy.interval(), Duration::from_secs(10));
        assert!(!policy.verify_tls);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let policy: HealthCheckPolicy = serde_json::from_str(r#"{"attempts": 3}"#).unwrap();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.interval_seconds, 10);
    }
}
