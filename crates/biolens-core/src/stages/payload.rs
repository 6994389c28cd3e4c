//! Parsing boundary for model output.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A stage's interpreted model output: the schema record when the text
/// parsed, otherwise the raw text verbatim. Malformed output is never an
/// error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StagePayload<T> {
    Structured(T),
    RawText(String),
}

/// Strip a surrounding Markdown code fence (```` ```json ... ``` ````) if
/// present.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    match rest.split_once('\n') {
        Some((info, body)) if !info.contains(['{', '[']) => body.trim(),
        _ => rest.trim(),
    }
}

impl<T: DeserializeOwned> StagePayload<T> {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<T>(strip_code_fence(text)) {
            Ok(value) => Self::Structured(value),
            Err(err) => {
                tracing::debug!(error = %err, "model output does not match schema");
                Self::RawText(text.to_string())
            }
        }
    }
}

impl<T> StagePayload<T> {
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    pub fn structured(&self) -> Option<&T> {
        match self {
            Self::Structured(v) => Some(v),
            Self::RawText(_) => None,
        }
    }
}

impl<T: Serialize> StagePayload<T> {
    /// Rendering used when this payload feeds a downstream prompt.
    pub fn to_prompt_text(&self) -> String {
        match self {
            Self::Structured(v) => serde_json::to_string_pretty(v)
                .unwrap_or_else(|e| format!("<unserialisable findings: {e}>")),
            Self::RawText(raw) => raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Finding {
        name: String,
    }

    #[test]
    fn test_plain_json_is_structured() {
        let p = StagePayload::<Finding>::parse(r#"{"name":"rash"}"#);
        assert_eq!(
            p,
            StagePayload::Structured(Finding {
                name: "rash".into()
            })
        );
    }

    #[test]
    fn test_fenced_json_is_structured() {
        let p = StagePayload::<Finding>::parse("```json\n{\"name\":\"cough\"}\n```");
        assert_eq!(p.structured().unwrap().name, "cough");

        let p = StagePayload::<Finding>::parse("```{\"name\":\"cough\"}```");
        assert!(p.is_structured());
    }

    #[test]
    fn test_prose_falls_back_to_raw_text() {
        let text = "I think this is probably a fungal infection.";
        let p = StagePayload::<Finding>::parse(text);
        assert_eq!(p, StagePayload::RawText(text.to_string()));
        assert_eq!(p.to_prompt_text(), text);
    }

    #[test]
    fn test_schema_mismatch_falls_back_to_raw_text() {
        let p = StagePayload::<Finding>::parse(r#"{"label":"rash"}"#);
        assert!(!p.is_structured());
    }
}
