//! Structured observability hooks for model calls and pipeline runs.
//!
//! Every function emits one event with a stable `event = "..."` field so a
//! log sink can filter on it. Run with `--json` (or `telemetry::init_tracing`
//! with `json = true`) for machine-readable output.

use tracing::{info, warn};

use biolens_domain::CaseId;

use crate::orchestrator::PipelinePhase;
use crate::resilience::CallError;
use crate::stages::StageKind;

/// Span tagging every event emitted while one case is in the pipeline.
/// Attach with `tracing::Instrument::instrument` so it follows the run
/// across await points.
pub fn pipeline_span(case_id: CaseId) -> tracing::Span {
    tracing::info_span!("biolens.pipeline", case_id = %case_id)
}

pub fn emit_call_attempt(caller: &str, attempt: u32, max_attempts: u32) {
    tracing::debug!(
        event = "call.attempt",
        caller = %caller,
        attempt = attempt,
        max_attempts = max_attempts,
    );
}

pub fn emit_call_succeeded(caller: &str, attempts: u32) {
    info!(event = "call.succeeded", caller = %caller, attempts = attempts);
}

/// Emit event: a transient failure will be retried after `delay_ms`.
pub fn emit_call_retry(caller: &str, attempt: u32, delay_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "call.retry",
        caller = %caller,
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}

pub fn emit_call_failed(caller: &str, attempts: u32, error: &CallError) {
    let kind = match error {
        CallError::CircuitOpen { .. } => "circuit_open",
        CallError::Exhausted { .. } => "exhausted",
        CallError::NonRetryable { .. } => "non_retryable",
        CallError::Cancelled { .. } => "cancelled",
    };
    warn!(
        event = "call.failed",
        caller = %caller,
        attempts = attempts,
        kind = kind,
        error = %error,
    );
}

pub fn emit_circuit_opened(caller: &str, consecutive_failures: u32, cooldown_ms: u64) {
    warn!(
        event = "circuit.opened",
        caller = %caller,
        consecutive_failures = consecutive_failures,
        cooldown_ms = cooldown_ms,
    );
}

pub fn emit_circuit_half_open(caller: &str, consecutive_failures: u32) {
    info!(
        event = "circuit.half_open",
        caller = %caller,
        consecutive_failures = consecutive_failures,
    );
}

pub fn emit_circuit_closed(caller: &str) {
    info!(event = "circuit.closed", caller = %caller);
}

pub fn emit_pipeline_started(case_id: CaseId, images: usize, has_audio: bool) {
    info!(
        event = "pipeline.started",
        case_id = %case_id,
        images = images,
        has_audio = has_audio,
    );
}

/// Emit event: one stage boundary crossed, with its trace message.
pub fn emit_stage_finished(case_id: CaseId, stage: StageKind, success: bool, message: &str) {
    info!(
        event = "pipeline.stage_finished",
        case_id = %case_id,
        stage = %stage,
        success = success,
        message = %message,
    );
}

/// Emit event: run ended in `phase` (`completed` or `failed`).
pub fn emit_pipeline_finished(case_id: CaseId, duration_ms: u64, phase: PipelinePhase) {
    info!(
        event = "pipeline.finished",
        case_id = %case_id,
        duration_ms = duration_ms,
        phase = %phase,
        success = phase == PipelinePhase::Completed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_span_create() {
        let span = pipeline_span(CaseId::new());
        let _entered = span.enter();
        emit_pipeline_started(CaseId::new(), 0, true);
    }
}
