//! Outbound request and response shapes for the generative model.

use serde::{Deserialize, Serialize};

pub const MIME_JSON: &str = "application/json";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_WAV: &str = "audio/wav";

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    /// Forces structured output when set (e.g. `application/json`).
    pub response_mime_type: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 2048,
            response_mime_type: None,
        }
    }
}

impl GenerationConfig {
    /// The same parameters with JSON response mode switched on.
    pub fn json(&self) -> Self {
        Self {
            response_mime_type: Some(MIME_JSON.to_string()),
            ..self.clone()
        }
    }
}

/// Binary media attached inline to a request.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl MediaPart {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: MIME_JPEG.to_string(),
            data,
        }
    }

    pub fn wav(data: Vec<u8>) -> Self {
        Self {
            mime_type: MIME_WAV.to_string(),
            data,
        }
    }
}

impl std::fmt::Debug for MediaPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPart")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub prompt: String,
    pub media: Vec<MediaPart>,
    pub generation: GenerationConfig,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>, generation: GenerationConfig) -> Self {
        Self {
            prompt: prompt.into(),
            media: Vec::new(),
            generation,
        }
    }

    pub fn with_media(mut self, part: MediaPart) -> Self {
        self.media.push(part);
        self
    }
}

/// Raw model reply. The text is expected, not guaranteed, to be JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    pub finish_reason: Option<String>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_keeps_sampling_parameters() {
        let g = GenerationConfig {
            temperature: 0.7,
            ..GenerationConfig::default()
        }
        .json();
        assert_eq!(g.temperature, 0.7);
        assert_eq!(g.top_k, 40);
        assert_eq!(g.response_mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_media_debug_hides_bytes() {
        let part = MediaPart::jpeg(vec![0xff; 4096]);
        let dbg = format!("{part:?}");
        assert!(dbg.contains("4096"));
        assert!(!dbg.contains("255"));
    }
}
