//! Retry, timeout, and circuit-breaker parameters for a [`super::ResilientCaller`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};

/// Composed resilience policy applied to every outbound model call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResiliencePolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Wall-clock limit for one attempt, retries included individually (milliseconds).
    pub attempt_timeout_ms: u64,
    /// Exponential base: the delay before retry `n` is `backoff_unit_ms * backoff_base^n`.
    pub backoff_base: u32,
    /// Unit the exponential delay is expressed in (milliseconds).
    pub backoff_unit_ms: u64,
    /// Consecutive failed calls that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe (milliseconds).
    pub cooldown_ms: u64,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            attempt_timeout_ms: 30_000,
            backoff_base: 2,
            backoff_unit_ms: 1_000,
            failure_threshold: 3,
            cooldown_ms: 60_000,
        }
    }
}

impl ResiliencePolicy {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = u64::from(self.backoff_base).saturating_pow(retry);
        Duration::from_millis(self.backoff_unit_ms.saturating_mul(factor))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.attempt_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "resilience.attempt_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "resilience.failure_threshold must be at least 1".into(),
            ));
        }
        if self.backoff_base == 0 {
            return Err(ConfigError::Invalid(
                "resilience.backoff_base must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let p = ResiliencePolicy::default();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.attempt_timeout(), Duration::from_secs(30));
        assert_eq!(p.failure_threshold, 3);
        assert_eq!(p.cooldown(), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_is_base_to_the_retry() {
        let p = ResiliencePolicy::default();
        assert_eq!(p.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(p.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(p.backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let p = ResiliencePolicy {
            backoff_base: 10,
            backoff_unit_ms: u64::MAX / 2,
            ..ResiliencePolicy::default()
        };
        assert_eq!(p.backoff_delay(30), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let p = ResiliencePolicy {
            failure_threshold: 0,
            ..ResiliencePolicy::default()
        };
        assert!(p.validate().is_err());
        assert!(ResiliencePolicy::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let p: ResiliencePolicy = toml::from_str("max_retries = 1").unwrap();
        assert_eq!(p.max_retries, 1);
        assert_eq!(p.cooldown_ms, 60_000);
    }
}
