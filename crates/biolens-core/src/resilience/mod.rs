//! Fault-tolerant wrapper for outbound model calls.
//!
//! - `ResiliencePolicy`: retry budget, backoff, per-attempt timeout, breaker
//!   threshold and cooldown
//! - `CircuitBreaker`: process-wide Closed / Open / HalfOpen state
//! - `ResilientCaller`: composes the two around a `ModelTransport`

pub mod breaker;
pub mod caller;
pub mod error;
pub mod policy;

pub use breaker::{Admission, BreakerSnapshot, CircuitBreaker, CircuitState, Rejection};
pub use caller::ResilientCaller;
pub use error::{CallError, CallResult};
pub use policy::ResiliencePolicy;
