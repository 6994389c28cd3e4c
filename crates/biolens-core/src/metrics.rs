//! Process-wide counters for model calls and pipeline runs.
//!
//! Incremented at the call site; [`Metrics::flush`] emits them all as one
//! `info!` event, typically at the end of a CLI command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub attempts: u64,
    pub retries: u64,
    pub circuit_opens: u64,
    pub circuit_rejections: u64,
    pub pipeline_runs: u64,
    pub pipeline_successes: u64,
    pub pipeline_failures: u64,
}

pub struct Metrics {
    calls: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    circuit_opens: AtomicU64,
    circuit_rejections: AtomicU64,
    pipeline_runs: AtomicU64,
    pipeline_successes: AtomicU64,
    pipeline_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter {
    ($inc:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = stringify!($field), "counter incremented");
        }
    };
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            circuit_opens: AtomicU64::new(0),
            circuit_rejections: AtomicU64::new(0),
            pipeline_runs: AtomicU64::new(0),
            pipeline_successes: AtomicU64::new(0),
            pipeline_failures: AtomicU64::new(0),
        }
    }

    counter!(inc_calls, calls);
    counter!(inc_attempts, attempts);
    counter!(inc_retries, retries);
    counter!(inc_circuit_opens, circuit_opens);
    counter!(inc_circuit_rejections, circuit_rejections);
    counter!(inc_pipeline_runs, pipeline_runs);
    counter!(inc_pipeline_successes, pipeline_successes);
    counter!(inc_pipeline_failures, pipeline_failures);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            circuit_opens: self.circuit_opens.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            pipeline_runs: self.pipeline_runs.load(Ordering::Relaxed),
            pipeline_successes: self.pipeline_successes.load(Ordering::Relaxed),
            pipeline_failures: self.pipeline_failures.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            calls = s.calls,
            attempts = s.attempts,
            retries = s.retries,
            circuit_opens = s.circuit_opens,
            circuit_rejections = s.circuit_rejections,
            pipeline_runs = s.pipeline_runs,
            pipeline_successes = s.pipeline_successes,
            pipeline_failures = s.pipeline_failures,
        );
    }

    pub fn reset(&self) {
        for counter in [
            &self.calls,
            &self.attempts,
            &self.retries,
            &self.circuit_opens,
            &self.circuit_rejections,
            &self.pipeline_runs,
            &self.pipeline_successes,
            &self.pipeline_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_calls();
        m.inc_attempts();
        m.inc_attempts();
        m.inc_retries();
        m.inc_pipeline_failures();

        let s = m.snapshot();
        assert_eq!(s.calls, 1);
        assert_eq!(s.attempts, 2);
        assert_eq!(s.retries, 1);
        assert_eq!(s.pipeline_failures, 1);
        assert_eq!(s.circuit_opens, 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_circuit_opens();
        m.inc_pipeline_runs();
        m.reset();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }
}
