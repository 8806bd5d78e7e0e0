//! Response Shape Normalization
//!
//! Upstream proxies return the completion payload in several shapes: a plain
//! string, an ordered array of string fragments, a structured chat-completion
//! object, or (when the base URL points at a web server instead of the API)
//! an HTML error page. A single classification step produces a closed tagged
//! variant; the normalizer consumes it exhaustively and yields one text
//! payload.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{MuseError, Result};

/// Raw upstream result, classified once before content extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// The endpoint served a web page; the base URL is misconfigured.
    HtmlPage(String),
    /// Ordered content fragments from a proxy that splits the payload.
    Fragments(Vec<String>),
    /// A bare string payload.
    Text(String),
    /// A structured chat-completion object.
    Completion(ChatCompletion),
}

/// Structured chat-completion body (the subset this layer reads).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Trimmed, case-folded check for a doctype or html open tag.
pub fn looks_like_html(text: &str) -> bool {
    let head = text.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

impl RawResponse {
    /// Classify a raw upstream body into its shape.
    pub fn classify(body: &str) -> Self {
        if looks_like_html(body) {
            return Self::HtmlPage(body.to_string());
        }

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Array(items)) => Self::Fragments(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            Ok(Value::String(s)) => Self::Text(s),
            Ok(object @ Value::Object(_)) => {
                Self::Completion(serde_json::from_value(object).unwrap_or_default())
            }
            // Numbers, booleans, null, or non-JSON bodies are plain text
            _ => Self::Text(body.to_string()),
        }
    }
}

/// Extract the single text payload from a classified response.
///
/// An HTML page is a terminal configuration failure: the endpoint is serving
/// web content, so retrying any model is useless. Empty or whitespace-only
/// content is recoverable and stays inside the retry/fallback loop.
pub fn normalize(raw: RawResponse, model: &str) -> Result<String> {
    let text = match raw {
        RawResponse::HtmlPage(_) => {
            return Err(MuseError::HtmlResponse {
                model: model.to_string(),
            });
        }
        RawResponse::Fragments(parts) => parts.concat(),
        RawResponse::Text(text) => text,
        RawResponse::Completion(completion) => completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default(),
    };

    // A proxy can wrap an HTML error page in a JSON string
    if looks_like_html(&text) {
        return Err(MuseError::HtmlResponse {
            model: model.to_string(),
        });
    }

    if text.trim().is_empty() {
        return Err(MuseError::upstream("no usable content in model response"));
    }

    Ok(text)
}

// =============================================================================
// Tests
// =============================================================================
