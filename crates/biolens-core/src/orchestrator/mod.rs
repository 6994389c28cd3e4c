//! Pipeline orchestration: phases, outcome, errors and the runner.

pub mod error;
pub mod outcome;
pub mod phase;
pub mod runner;

pub use error::{PipelineError, PipelineResult};
pub use outcome::PipelineOutcome;
pub use phase::PipelinePhase;
pub use runner::DiagnosticOrchestrator;
