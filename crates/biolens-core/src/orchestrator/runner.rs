//! Sequential diagnostic pipeline over one case.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Instrument};

use biolens_domain::{
    CaseId, CaseRepository, DiagnosticCase, DifferentialDiagnosis, DomainError, MediaStore,
    TreatmentProtocol,
};

use super::error::{PipelineError, PipelineResult};
use super::outcome::PipelineOutcome;
use super::phase::PipelinePhase;
use crate::config::PipelineConfig;
use crate::metrics::METRICS;
use crate::model::GenerationConfig;
use crate::obs;
use crate::resilience::{CallError, ResilientCaller};
use crate::stages::{
    DiagnosisReport, ImageAnalysisStage, ReasoningInput, ReasoningStage, ResolvedAudio,
    ResolvedImage, StageAgent, StagePayload, StageResult, SymptomExtractionStage,
    TreatmentPlanningStage,
};

/// Runs image analysis, symptom extraction, reasoning and treatment
/// planning in dependency order and annotates the case on full success.
///
/// The case is loaded at the start and saved once at the end; no
/// intermediate stage state is persisted, so a re-run after a failure
/// starts from the beginning.
pub struct DiagnosticOrchestrator {
    image: ImageAnalysisStage,
    audio: SymptomExtractionStage,
    reasoning: ReasoningStage,
    treatment: TreatmentPlanningStage,
    cases: Arc<dyn CaseRepository>,
    media: Arc<dyn MediaStore>,
    config: PipelineConfig,
}

/// Mutable bookkeeping for a single run.
struct RunState {
    case_id: CaseId,
    phase: PipelinePhase,
    trace: Vec<String>,
}

impl RunState {
    /// Fold one stage result into the run: extend the trace and advance
    /// the phase on success, or turn the failure into the run's error.
    fn absorb<T>(
        &mut self,
        result: StageResult<T>,
        cancel: &CancellationToken,
    ) -> PipelineResult<StagePayload<T>> {
        let StageResult {
            stage,
            payload,
            messages,
            error,
        } = result;

        if cancel.is_cancelled() || error.as_ref().is_some_and(CallError::is_cancelled) {
            self.phase = PipelinePhase::Failed;
            self.trace.clear();
            return Err(PipelineError::Cancelled);
        }

        for message in &messages {
            obs::emit_stage_finished(self.case_id, stage, error.is_none(), message);
        }
        self.trace.extend(messages);

        match (payload, error) {
            (Some(payload), None) => {
                match self.phase.advance(stage) {
                    Some(next) => self.phase = next,
                    None => {
                        warn!(phase = %self.phase, stage = %stage, "stage finished out of order")
                    }
                }
                Ok(payload)
            }
            (_, error) => {
                self.phase = PipelinePhase::Failed;
                let source = error.unwrap_or_else(|| CallError::NonRetryable {
                    reason: format!("{stage} produced no output"),
                    status: None,
                });
                Err(PipelineError::StageFailed {
                    stage,
                    source,
                    trace: std::mem::take(&mut self.trace),
                })
            }
        }
    }

    /// Fold the results of concurrently run intake stages. A stage that was
    /// stopped because its sibling failed gives way to the sibling's failure.
    fn absorb_intake<A, B>(
        &mut self,
        image: StageResult<A>,
        audio: StageResult<B>,
        cancel: &CancellationToken,
    ) -> PipelineResult<(StagePayload<A>, StagePayload<B>)> {
        if !cancel.is_cancelled() && image.is_cancelled() && !audio.is_success() {
            return match self.absorb(audio, cancel) {
                Err(err) => Err(err),
                Ok(_) => Err(PipelineError::Cancelled),
            };
        }
        let image = self.absorb(image, cancel)?;
        let audio = self.absorb(audio, cancel)?;
        Ok((image, audio))
    }
}

impl DiagnosticOrchestrator {
    pub fn new(
        caller: Arc<ResilientCaller>,
        generation: GenerationConfig,
        cases: Arc<dyn CaseRepository>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            image: ImageAnalysisStage::new(caller.clone(), generation.clone()),
            audio: SymptomExtractionStage::new(caller.clone(), generation.clone()),
            reasoning: ReasoningStage::new(caller.clone(), generation.clone()),
            treatment: TreatmentPlanningStage::new(caller, generation),
            cases,
            media,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the case, run the pipeline, save the annotated case.
    ///
    /// On any error nothing is saved and the stored case is unchanged.
    pub async fn run(
        &self,
        case_id: CaseId,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutcome> {
        let mut case = self
            .cases
            .load(case_id)
            .await?
            .ok_or(PipelineError::CaseNotFound { case_id })?;
        let outcome = self.run_case(&mut case, cancel).await?;
        self.cases.save(&case).await?;
        Ok(outcome)
    }

    /// Run the pipeline against an in-memory case without persistence.
    ///
    /// `case` is replaced with the annotated copy only on full success.
    pub async fn run_case(
        &self,
        case: &mut DiagnosticCase,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutcome> {
        let span = obs::pipeline_span(case.id());
        self.run_instrumented(case, cancel).instrument(span).await
    }

    async fn run_instrumented(
        &self,
        case: &mut DiagnosticCase,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutcome> {
        let status = case.status();
        if !status.accepts_diagnosis() {
            return Err(PipelineError::State(DomainError::StateViolation {
                operation: "run diagnosis",
                status,
            }));
        }

        let case_id = case.id();
        let started = Instant::now();
        METRICS.inc_pipeline_runs();
        obs::emit_pipeline_started(
            case_id,
            case.images().len(),
            case.audio_description().is_some(),
        );

        let mut run = RunState {
            case_id,
            phase: PipelinePhase::NotStarted,
            trace: Vec::new(),
        };
        let result = self.execute(case, &mut run, cancel).await;
        if result.is_err() {
            run.phase = PipelinePhase::Failed;
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_pipeline_finished(case_id, duration_ms, run.phase);
        match result {
            Ok(mut outcome) => {
                METRICS.inc_pipeline_successes();
                outcome.duration_ms = duration_ms;
                Ok(outcome)
            }
            Err(err) => {
                METRICS.inc_pipeline_failures();
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        case: &mut DiagnosticCase,
        run: &mut RunState,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutcome> {
        let mut working = case.clone();
        working.start_diagnosis();
        let (images, recording) = self.resolve_media(&working).await?;

        let (image_findings, symptom_findings) = if self.config.concurrent_intake {
            // A failing stage stops its sibling instead of waiting out its retries.
            let image_cancel = cancel.child_token();
            let audio_cancel = cancel.child_token();
            let image = async {
                let result = self.image.run(&images, &working, &image_cancel).await;
                if !result.is_success() {
                    audio_cancel.cancel();
                }
                result
            };
            let audio = async {
                let result = self.audio.run(&recording, &working, &audio_cancel).await;
                if !result.is_success() {
                    image_cancel.cancel();
                }
                result
            };
            let (image, audio) = futures::join!(image, audio);
            run.absorb_intake(image, audio, cancel)?
        } else {
            let image = run.absorb(self.image.run(&images, &working, cancel).await, cancel)?;
            let audio = run.absorb(self.audio.run(&recording, &working, cancel).await, cancel)?;
            (image, audio)
        };

        let reasoning_input = ReasoningInput {
            image_findings,
            symptom_findings,
        };
        let report = run.absorb(
            self.reasoning.run(&reasoning_input, &working, cancel).await,
            cancel,
        )?;
        let protocol = run.absorb(self.treatment.run(&report, &working, cancel).await, cancel)?;

        let (primary, alternatives, reasoning_steps) = split_report(report);
        let protocol = match protocol {
            StagePayload::Structured(protocol) => protocol,
            StagePayload::RawText(raw) => TreatmentProtocol::unstructured(&raw),
        };

        working.complete_diagnosis(primary.clone(), alternatives.clone(), protocol.clone())?;
        if let Some(done) = run.phase.complete() {
            run.phase = done;
        }
        *case = working;

        Ok(PipelineOutcome {
            case_id: run.case_id,
            primary_diagnosis: primary,
            alternative_diagnoses: alternatives,
            treatment_protocol: protocol,
            reasoning_steps,
            trace: std::mem::take(&mut run.trace),
            duration_ms: 0,
        })
    }

    async fn resolve_media(
        &self,
        case: &DiagnosticCase,
    ) -> PipelineResult<(Vec<ResolvedImage>, Option<ResolvedAudio>)> {
        let mut images = Vec::with_capacity(case.images().len());
        for image in case.images() {
            let bytes = self.media.get(&image.content).await?;
            images.push(ResolvedImage {
                image: image.clone(),
                bytes,
            });
        }

        let audio = match case.audio_description() {
            Some(description) => {
                let recording = match &description.content {
                    Some(digest) => Some(self.media.get(digest).await?),
                    None => None,
                };
                Some(ResolvedAudio {
                    description: description.clone(),
                    recording,
                })
            }
            None => None,
        };
        Ok((images, audio))
    }
}

fn split_report(
    report: StagePayload<DiagnosisReport>,
) -> (DifferentialDiagnosis, Vec<DifferentialDiagnosis>, Vec<String>) {
    match report {
        StagePayload::Structured(r) => (
            r.primary_diagnosis,
            r.alternative_diagnoses,
            r.reasoning_steps,
        ),
        StagePayload::RawText(raw) => (
            DifferentialDiagnosis::unstructured(&raw),
            Vec::new(),
            Vec::new(),
        ),
    }
}
