//! Closed / Open / HalfOpen circuit breaker shared by every call through one
//! [`super::ResilientCaller`].
//!
//! All state sits behind one mutex that is never held across an await.
//! Time is read from `tokio::time::Instant` so paused-clock tests drive the
//! cooldown deterministically.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::obs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// One probe call is allowed through.
    HalfOpen,
}

/// How a call was let through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    /// The single half-open trial call.
    Probe,
}

/// Why a call was not let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub consecutive_failures: u32,
    pub retry_after: Duration,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Point-in-time view of the breaker, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub probe_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            threshold,
            cooldown,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decide whether a call may proceed. An open circuit whose cooldown
    /// has elapsed moves to HalfOpen and hands out the single probe.
    pub fn try_acquire(&self) -> Result<Admission, Rejection> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(self.cooldown);
                if elapsed >= self.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    obs::emit_circuit_half_open(&self.name, inner.consecutive_failures);
                    Ok(Admission::Probe)
                } else {
                    Err(Rejection {
                        consecutive_failures: inner.consecutive_failures,
                        retry_after: self.cooldown - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(Rejection {
                        consecutive_failures: inner.consecutive_failures,
                        retry_after: Duration::ZERO,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(Admission::Probe)
                }
            }
        }
    }

    /// A call succeeded: the dependency is healthy again.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        let was = inner.state;
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
        if was != CircuitState::Closed {
            obs::emit_circuit_closed(&self.name);
        }
    }

    /// A call failed transiently after its retry budget. Returns `true`
    /// when this failure opened (or reopened) the circuit.
    pub fn record_failure(&self, admission: Admission) -> bool {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let open = match (admission, inner.state) {
            (Admission::Probe, CircuitState::HalfOpen) => true,
            // A probe outliving a success that already closed the circuit
            // counts like any other failure.
            (_, CircuitState::Closed) => inner.consecutive_failures >= self.threshold,
            // A straggler from before the circuit opened; the count is
            // updated but the cooldown is not restarted.
            (_, _) => false,
        };
        if open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.probe_in_flight = false;
            obs::emit_circuit_opened(
                &self.name,
                inner.consecutive_failures,
                self.cooldown.as_millis() as u64,
            );
        }
        open
    }

    /// The call ended without a verdict on the dependency's health
    /// (cancelled, or rejected as non-retryable). Frees the probe slot so
    /// the next caller can try.
    pub fn release(&self, admission: Admission) {
        if admission == Admission::Probe {
            let mut inner = self.lock();
            if inner.state == CircuitState::HalfOpen {
                inner.probe_in_flight = false;
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            probe_in_flight: inner.probe_in_flight,
        }
    }
}
