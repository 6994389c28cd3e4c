//! Retry + circuit breaker + per-attempt timeout around a [`ModelTransport`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use super::breaker::{Admission, BreakerSnapshot, CircuitBreaker, CircuitState};
use super::error::{CallError, CallResult};
use super::policy::ResiliencePolicy;
use crate::metrics::METRICS;
use crate::model::{ModelRequest, ModelResponse, ModelTransport, TransportError};
use crate::obs;

/// Fault-tolerant client for the external model.
///
/// The breaker state is shared by every call made through one instance, so
/// concurrent pipeline runs see a single consistent failure count.
///
/// Composition per call:
/// 1. breaker check (an open circuit returns [`CallError::CircuitOpen`]
///    without touching the network or the retry budget);
/// 2. up to `max_retries + 1` attempts, each bounded by the attempt
///    timeout, with `unit * base^n` backoff before retry `n`;
/// 3. the call's verdict is recorded on the breaker.
///
/// A half-open probe gets exactly one attempt.
pub struct ResilientCaller {
    name: String,
    transport: Arc<dyn ModelTransport>,
    policy: ResiliencePolicy,
    breaker: CircuitBreaker,
}

impl ResilientCaller {
    pub fn new(transport: Arc<dyn ModelTransport>, policy: ResiliencePolicy) -> Self {
        Self::named("model", transport, policy)
    }

    /// `name` tags every log event and metric this caller emits.
    pub fn named(
        name: impl Into<String>,
        transport: Arc<dyn ModelTransport>,
        policy: ResiliencePolicy,
    ) -> Self {
        let name = name.into();
        let breaker =
            CircuitBreaker::new(name.clone(), policy.failure_threshold, policy.cooldown());
        Self {
            name,
            transport,
            policy,
            breaker,
        }
    }

    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    #[instrument(skip_all, fields(caller = %self.name, media_parts = request.media.len()))]
    pub async fn call(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> CallResult<ModelResponse> {
        METRICS.inc_calls();
        if cancel.is_cancelled() {
            return Err(CallError::Cancelled { attempts: 0 });
        }

        let admission = match self.breaker.try_acquire() {
            Ok(admission) => admission,
            Err(rejection) => {
                METRICS.inc_circuit_rejections();
                let err = CallError::CircuitOpen {
                    consecutive_failures: rejection.consecutive_failures,
                    retry_after_ms: rejection.retry_after.as_millis() as u64,
                };
                obs::emit_call_failed(&self.name, 0, &err);
                return Err(err);
            }
        };

        let max_attempts = match admission {
            Admission::Normal => self.policy.max_retries.saturating_add(1),
            Admission::Probe => 1,
        };
        let timeout = self.policy.attempt_timeout();

        let mut attempt = 0;
        loop {
            attempt += 1;
            METRICS.inc_attempts();
            obs::emit_call_attempt(&self.name, attempt, max_attempts);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.cancelled(admission, attempt));
                }
                outcome = tokio::time::timeout(timeout, self.transport.send(request)) => outcome,
            };

            let err = match outcome {
                Ok(Ok(response)) => {
                    self.breaker.record_success();
                    obs::emit_call_succeeded(&self.name, attempt);
                    return Ok(response);
                }
                Ok(Err(err)) => err,
                Err(_elapsed) => TransportError::Timeout {
                    limit_ms: self.policy.attempt_timeout_ms,
                },
            };

            if !err.is_transient() {
                self.breaker.release(admission);
                let err = CallError::NonRetryable {
                    reason: err.to_string(),
                    status: err.status(),
                };
                obs::emit_call_failed(&self.name, attempt, &err);
                return Err(err);
            }

            if attempt >= max_attempts {
                if self.breaker.record_failure(admission) {
                    METRICS.inc_circuit_opens();
                }
                let err = CallError::Exhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                };
                obs::emit_call_failed(&self.name, attempt, &err);
                return Err(err);
            }

            let delay = self.policy.backoff_delay(attempt);
            warn!(attempt, error = %err, "transient model call failure");
            METRICS.inc_retries();
            obs::emit_call_retry(&self.name, attempt, delay.as_millis() as u64, &err);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.cancelled(admission, attempt));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cancelled(&self, admission: Admission, attempts: u32) -> CallError {
        self.breaker.release(admission);
        let err = CallError::Cancelled { attempts };
        obs::emit_call_failed(&self.name, attempts, &err);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fakes::{ScriptedTransport, Step};
    use crate::model::GenerationConfig;
    use std::time::Duration;

    fn policy(max_retries: u32) -> ResiliencePolicy {
        ResiliencePolicy {
            max_retries,
            attempt_timeout_ms: 1_000,
            ..ResiliencePolicy::default()
        }
    }

    fn request() -> ModelRequest {
        ModelRequest::new("ping", GenerationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let transport = Arc::new(ScriptedTransport::sequence([Step::respond("pong")]));
        let caller = ResilientCaller::new(transport.clone(), policy(3));

        let resp = caller
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resp.text, "pong");
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::sequence([
            Step::status(503),
            Step::connection_reset(),
            Step::respond("ok"),
        ]));
        let caller = ResilientCaller::new(transport.clone(), policy(3));

        let started = tokio::time::Instant::now();
        let resp = caller
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resp.text, "ok");
        assert_eq!(transport.attempts(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2 + 4));
        assert_eq!(caller.breaker_snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried_but_bad_request_is_not() {
        let transport = Arc::new(ScriptedTransport::sequence([
            Step::status(429),
            Step::status(400),
        ]));
        let caller = ResilientCaller::new(transport.clone(), policy(3));

        let err = caller
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CallError::NonRetryable {
                reason: "model endpoint returned HTTP 400: scripted HTTP 400".into(),
                status: Some(400),
            }
        );
        assert_eq!(transport.attempts(), 2);
        assert_eq!(caller.breaker_snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_single_attempt() {
        let transport = Arc::new(ScriptedTransport::always(Step::status(500)));
        let caller = ResilientCaller::new(transport.clone(), policy(0));

        let err = caller
            .call(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Exhausted { attempts: 1, .. }));
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_makes_no_attempt() {
        let transport = Arc::new(ScriptedTransport::always(Step::respond("x")));
        let caller = ResilientCaller::new(transport.clone(), policy(3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = caller.call(&request(), &cancel).await.unwrap_err();
        assert_eq!(err, CallError::Cancelled { attempts: 0 });
        assert_eq!(transport.attempts(), 0);
    }
}
