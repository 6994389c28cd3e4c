//! Generative model boundary: request types, the transport trait, the
//! Gemini HTTP transport and a scripted fake.

pub mod fakes;
pub mod gemini;
pub mod request;
pub mod transport;

pub use gemini::GeminiTransport;
pub use request::{GenerationConfig, MediaPart, ModelRequest, ModelResponse};
pub use transport::{ModelTransport, TransportError, TransportResult};
