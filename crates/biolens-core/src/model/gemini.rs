//! Gemini `generateContent` transport.
//!
//! One `send` is one HTTP round-trip. Retry, breaker and timeout policy live
//! in [`crate::resilience`]; this type only maps the wire format and
//! classifies failures.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::request::{GenerationConfig, ModelRequest, ModelResponse};
use super::transport::{ModelTransport, TransportError, TransportResult};
use crate::config::ModelConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

impl From<&GenerationConfig> for WireGenerationConfig {
    fn from(g: &GenerationConfig) -> Self {
        Self {
            temperature: g.temperature,
            top_p: g.top_p,
            top_k: g.top_k,
            max_output_tokens: g.max_output_tokens,
            response_mime_type: g.response_mime_type.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn build_body(request: &ModelRequest) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(request.media.len() + 1);
    parts.push(WirePart::Text {
        text: request.prompt.clone(),
    });
    for media in &request.media {
        parts.push(WirePart::Inline {
            inline_data: InlineData {
                mime_type: media.mime_type.clone(),
                data: BASE64.encode(&media.data),
            },
        });
    }
    GenerateContentRequest {
        contents: vec![WireContent {
            role: "user",
            parts,
        }],
        generation_config: WireGenerationConfig::from(&request.generation),
    }
}

/// First text part of the first candidate.
fn extract_text(body: GenerateContentResponse) -> TransportResult<ModelResponse> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::Protocol("response contained no candidates".into()))?;
    let text = candidate
        .content
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| TransportError::Protocol("first candidate has no text part".into()))?;
    Ok(ModelResponse {
        text,
        finish_reason: candidate.finish_reason,
    })
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { limit_ms: 0 }
    } else if let Some(status) = err.status() {
        TransportError::Status {
            status: status.as_u16(),
            body: err.to_string(),
        }
    } else {
        TransportError::Connection(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// GeminiTransport
// ---------------------------------------------------------------------------

pub struct GeminiTransport {
    config: ModelConfig,
    http_client: reqwest::Client,
}

impl GeminiTransport {
    pub fn new(config: ModelConfig) -> TransportResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("biolens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    async fn send(&self, request: &ModelRequest) -> TransportResult<ModelResponse> {
        let url = self.endpoint();
        debug!(url = %url, media_parts = request.media.len(), "sending generateContent");

        let mut builder = self.http_client.post(&url).json(&build_body(request));
        if let Some(key) = &self.config.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        extract_text(body)
    }
}
