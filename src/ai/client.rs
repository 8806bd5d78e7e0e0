//! Client Handle Manager and HTTP Transport
//!
//! The upstream call boundary. [`ChatTransport`] is the seam the orchestrator
//! talks through; [`HttpTransport`] is the reqwest-backed implementation for
//! OpenAI-compatible chat-completion endpoints, and [`ClientManager`] holds
//! the lazily constructed, resettable shared handle.
//!
//! The API key is stored as a `SecretString` and never appears in logs or
//! debug output.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::response::{RawResponse, looks_like_html};
use crate::config::ApiConfig;
use crate::constants::network;
use crate::types::{MuseError, Result};

/// Ordered incremental content fragments from a streaming call.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// =============================================================================
// Request Types
// =============================================================================

/// Chat-completion request sent upstream.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ChatRequest {
    /// Build a request carrying the prompt as a single user message.
    pub fn user(model: &str, prompt: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature,
            response_format: None,
            stream: false,
        }
    }

    /// Request a JSON-object response from the model.
    pub fn with_json_mode(mut self) -> Self {
        self.response_format = Some(ResponseFormat {
            format_type: "json_object".to_string(),
        });
        self
    }

    /// Request a streamed response.
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Upstream call boundary. The HTTP implementation lives here; tests drive
/// the orchestrator through mock implementations.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue a blocking completion call, returning the classified raw result.
    async fn complete(&self, request: &ChatRequest) -> Result<RawResponse>;

    /// Issue a streaming call, returning content fragments as they arrive.
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream>;

    /// Probe upstream availability.
    async fn health_check(&self) -> Result<bool>;
}

/// Shared transport handle for concurrent invocations.
pub type SharedTransport = Arc<dyn ChatTransport>;

// =============================================================================
// HTTP Transport
// =============================================================================

/// Reqwest-backed transport for OpenAI-compatible endpoints.
pub struct HttpTransport {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_key", &"[REDACTED]")
            .field("base", &self.base)
            .finish()
    }
}

impl HttpTransport {
    /// Construct a transport from configuration. Both the base URL and the
    /// key are required; a missing value is a non-retryable configuration
    /// error carrying remediation guidance.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base = config
            .base
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                MuseError::config(
                    "API base URL is not configured; set POSTMUSE_API_BASE or api.base in postmuse.toml",
                )
            })?;

        let key = config
            .key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                MuseError::config(
                    "API key is not configured; set POSTMUSE_API_KEY or api.key in postmuse.toml",
                )
            })?;

        Url::parse(base)
            .map_err(|e| MuseError::config(format!("invalid API base URL {:?}: {}", base, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MuseError::upstream(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(key.to_string()),
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    async fn send(&self, request: &ChatRequest) -> Result<(reqwest::StatusCode, reqwest::Response)> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| MuseError::upstream(format!("request failed: {}", e)))?;

        Ok((response.status(), response))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<RawResponse> {
        debug!(model = %request.model, "sending chat completion request");

        let (status, response) = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| MuseError::upstream(format!("failed to read response body: {}", e)))?;

        // A web server answering where the API should be serves HTML on both
        // success and error statuses; classification catches either.
        if looks_like_html(&body) {
            return Ok(RawResponse::HtmlPage(body));
        }

        if !status.is_success() {
            return Err(MuseError::upstream(format!(
                "upstream returned {}: {}",
                status,
                snippet(&body)
            )));
        }

        Ok(RawResponse::classify(&body))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream> {
        debug!(model = %request.model, "opening chat completion stream");

        let (status, response) = self.send(request).await?;

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if looks_like_html(&body) {
                return Err(MuseError::HtmlResponse {
                    model: request.model.clone(),
                });
            }
            return Err(MuseError::upstream(format!(
                "upstream returned {}: {}",
                status,
                snippet(&body)
            )));
        }

        let decoder = SseDecoder::new(Box::pin(response.bytes_stream()));
        Ok(Box::pin(futures::stream::try_unfold(
            decoder,
            |mut decoder| async move {
                match decoder.next_fragment().await {
                    Ok(Some(fragment)) => Ok(Some((fragment, decoder))),
                    Ok(None) => Ok(None),
                    Err(e) => Err(e),
                }
            },
        )))
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!(status = %resp.status(), "upstream health check failed");
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "upstream health check failed");
                Ok(false)
            }
        }
    }
}

/// Unicode-safe truncation of an upstream body for error messages.
fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= network::MAX_BODY_SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed
        .chars()
        .take(network::MAX_BODY_SNIPPET_CHARS)
        .collect();
    format!("{}…", cut)
}

// =============================================================================
// SSE Decoding
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental decoder for `data:`-framed chat-completion chunks.
///
/// Buffers only up to line granularity; fragments are surfaced as soon as a
/// complete chunk line has arrived.
struct SseDecoder<S> {
    bytes: S,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

impl<S, B, E> SseDecoder<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    fn new(bytes: S) -> Self {
        Self {
            bytes,
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    async fn next_fragment(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(fragment) = self.pending.pop_front() {
                return Ok(Some(fragment));
            }
            if self.done {
                return Ok(None);
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    self.buffer
                        .push_str(&String::from_utf8_lossy(chunk.as_ref()));
                    self.drain_lines();
                }
                Some(Err(e)) => {
                    return Err(MuseError::upstream(format!("stream read failed: {}", e)));
                }
                None => {
                    self.done = true;
                    let rest = std::mem::take(&mut self.buffer);
                    let rest = rest.trim();
                    if !rest.is_empty() {
                        self.decode_line(rest);
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) {
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            self.decode_line(line.trim());
        }
    }

    fn decode_line(&mut self, line: &str) {
        let Some(payload) = line.strip_prefix("data:") else {
            // comments / keep-alives / event names
            return;
        };
        let payload = payload.trim();

        if payload == "[DONE]" {
            self.done = true;
            return;
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => {
                if let Some(content) = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    && !content.is_empty()
                {
                    self.pending.push_back(content);
                }
            }
            Err(e) => debug!(error = %e, "skipping undecodable stream line"),
        }
    }
}

// =============================================================================
// Client Handle Manager
// =============================================================================

/// Lazily constructed, resettable shared transport handle.
///
/// The handle is immutable once built; callers snapshot the `Arc` at attempt
/// start, so a concurrent [`ClientManager::reset`] never disturbs in-flight
/// requests.
#[derive(Debug, Default)]
pub struct ClientManager {
    handle: RwLock<Option<Arc<HttpTransport>>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle, constructing it from configuration on first
    /// use. Missing configuration fails fast with a non-retryable error.
    pub async fn get(&self, config: &ApiConfig) -> Result<Arc<HttpTransport>> {
        if let Some(handle) = self.handle.read().await.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let mut guard = self.handle.write().await;
        // Another caller may have won the race while we waited for the lock
        if let Some(handle) = guard.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let built = Arc::new(HttpTransport::new(config)?);
        *guard = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Drop the cached handle so the next call re-reads configuration.
    pub async fn reset(&self) {
        self.handle.write().await.take();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;

    fn api_config(base: Option<&str>, key: Option<&str>) -> ApiConfig {
        ApiConfig {
            base: base.map(String::from),
            key: key.map(String::from),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_new_requires_base_and_key() {
        let err = HttpTransport::new(&api_config(None, Some("k"))).unwrap_err();
        assert!(err.is_terminal());
        assert!(err.to_string().contains("base URL"));

        let err = HttpTransport::new(&api_config(Some("https://x.test/v1"), None)).unwrap_err();
        assert!(err.is_terminal());
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let err = HttpTransport::new(&api_config(Some("not a url"), Some("k"))).unwrap_err();
        assert_eq!(err.category(), "CONFIG");
    }

    #[test]
    fn test_endpoint_joining_strips_trailing_slash() {
        let transport =
            HttpTransport::new(&api_config(Some("https://x.test/v1/"), Some("k"))).unwrap();
        assert_eq!(
            transport.endpoint("chat/completions"),
            "https://x.test/v1/chat/completions"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let transport =
            HttpTransport::new(&api_config(Some("https://x.test/v1"), Some("sk-secret"))).unwrap();
        let rendered = format!("{:?}", transport);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest::user("glm-4-flash", "hello", 0.7).with_json_mode();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "glm-4-flash");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["stream"], false);

        let plain = ChatRequest::user("m", "p", 0.7).streaming();
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("response_format").is_none());
        assert_eq!(value["stream"], true);
    }

    fn sse_chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Vec<u8>, Infallible>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_sse_decoder_yields_fragments_in_order() {
        let chunks = sse_chunks(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n\ndata: [DONE]\n",
        ]);
        let mut decoder = SseDecoder::new(Box::pin(chunks));

        let mut collected = Vec::new();
        while let Some(fragment) = decoder.next_fragment().await.unwrap() {
            collected.push(fragment);
        }
        assert_eq!(collected, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_sse_decoder_handles_split_lines() {
        let chunks = sse_chunks(&[
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"he\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n",
        ]);
        let mut decoder = SseDecoder::new(Box::pin(chunks));

        assert_eq!(decoder.next_fragment().await.unwrap().unwrap(), "he");
        assert_eq!(decoder.next_fragment().await.unwrap().unwrap(), "llo");
        assert!(decoder.next_fragment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sse_decoder_skips_keepalives_and_role_deltas() {
        let chunks = sse_chunks(&[
            ": keep-alive\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
            "data: [DONE]\n",
        ]);
        let mut decoder = SseDecoder::new(Box::pin(chunks));

        assert_eq!(decoder.next_fragment().await.unwrap().unwrap(), "x");
        assert!(decoder.next_fragment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sse_decoder_flushes_unterminated_tail() {
        let chunks = sse_chunks(&["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"]);
        let mut decoder = SseDecoder::new(Box::pin(chunks));

        assert_eq!(decoder.next_fragment().await.unwrap().unwrap(), "tail");
        assert!(decoder.next_fragment().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_client_manager_caches_and_resets() {
        let manager = ClientManager::new();
        let config = api_config(Some("https://x.test/v1"), Some("k"));

        let first = manager.get(&config).await.unwrap();
        let second = manager.get(&config).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        manager.reset().await;
        let third = manager.get(&config).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[tokio::test]
    async fn test_client_manager_missing_config_fails_fast() {
        let manager = ClientManager::new();
        let err = manager.get(&api_config(None, None)).await.unwrap_err();
        assert!(err.is_terminal());
        assert_eq!(err.category(), "CONFIG");
        assert!(err.remediation().is_some());
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let cut = snippet(&long);
        assert!(cut.chars().count() <= network::MAX_BODY_SNIPPET_CHARS + 1);
        assert!(cut.ends_with('…'));
    }
}
