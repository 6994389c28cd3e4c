//! Error types for the resilience layer.

/// Typed outcome of a failed [`super::ResilientCaller::call`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The breaker rejected the call before any network attempt.
    #[error(
        "circuit breaker open after {consecutive_failures} consecutive failed call(s); retry in {retry_after_ms}ms"
    )]
    CircuitOpen {
        consecutive_failures: u32,
        retry_after_ms: u64,
    },

    #[error("model call failed after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// The endpoint answered with something retrying cannot fix.
    #[error("model call rejected: {reason}")]
    NonRetryable { reason: String, status: Option<u16> },

    #[error("model call cancelled during attempt {attempts}")]
    Cancelled { attempts: u32 },
}

impl CallError {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Network attempts made before the error was returned.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::CircuitOpen { .. } => 0,
            Self::NonRetryable { .. } => 1,
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// Result type for resilient calls.
pub type CallResult<T> = std::result::Result<T, CallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_open_reports_zero_attempts() {
        let err = CallError::CircuitOpen {
            consecutive_failures: 3,
            retry_after_ms: 60_000,
        };
        assert!(err.is_circuit_open());
        assert_eq!(err.attempts(), 0);
        assert!(err.to_string().contains("3 consecutive"));
    }

    #[test]
    fn test_exhausted_display_carries_last_error() {
        let err = CallError::Exhausted {
            attempts: 3,
            last_error: "request timed out after 1000ms".into(),
        };
        assert_eq!(err.attempts(), 3);
        assert!(err.to_string().contains("timed out"));
    }
}
