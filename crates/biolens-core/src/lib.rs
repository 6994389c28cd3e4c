//! BioLens Core: resilient model calls and the staged diagnostic pipeline
//!
//! ## Key Components
//!
//! - `ResilientCaller`: retry with exponential backoff, a shared circuit
//!   breaker and a per-attempt timeout around one `ModelTransport`
//! - `GeminiTransport`: `generateContent` over HTTPS
//! - Stage agents: image analysis, symptom extraction, reasoning, treatment
//!   planning, each making exactly one resilient call
//! - `DiagnosticOrchestrator`: runs the stages in dependency order and
//!   completes the case atomically on full success
//! - `CaseService`: the command surface used by the CLI

pub mod config;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod orchestrator;
pub mod resilience;
pub mod service;
pub mod stages;
pub mod telemetry;

pub use config::{BiolensConfig, ConfigError, ConfigResult, ModelConfig, PipelineConfig};
pub use metrics::METRICS;
pub use model::{
    GeminiTransport, GenerationConfig, MediaPart, ModelRequest, ModelResponse, ModelTransport,
    TransportError,
};
pub use orchestrator::{
    DiagnosticOrchestrator, PipelineError, PipelineOutcome, PipelinePhase, PipelineResult,
};
pub use resilience::{CallError, CallResult, CircuitState, ResiliencePolicy, ResilientCaller};
pub use service::{AudioUpload, CaseService, ImageUpload, NewCase, ServiceError, ServiceResult};
pub use stages::{StageAgent, StageKind, StagePayload, StageResult};
pub use telemetry::init_tracing;
