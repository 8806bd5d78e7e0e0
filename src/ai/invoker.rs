//! Invocation Orchestrator
//!
//! Drives the model × attempt grid: resolve the client handle, issue the
//! request, classify and normalize the response, validate the payload, and
//! walk the [`FallbackState`] machine on recoverable failures. Terminal
//! failures (missing configuration, HTML responses) abort everything
//! immediately, regardless of remaining retries or models.
//!
//! Backoff sleeps suspend only the calling task; concurrent invocations share
//! the lazily constructed client handle but otherwise proceed independently.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::client::{ChatRequest, ClientManager, SharedTransport};
use super::models::{resolve_models, supports_json_mode};
use super::response::normalize;
use super::retry::{Advance, FallbackState, RetryPolicy, RetryPolicyOverride};
use super::validation::validate_payload;
use crate::config::Config;
use crate::types::{MuseError, Result};

/// Resilient multi-model invoker.
pub struct Invoker {
    config: Config,
    policy: RwLock<RetryPolicy>,
    clients: ClientManager,
    transport_override: Option<SharedTransport>,
}

impl Invoker {
    /// Create an invoker from configuration.
    pub fn new(config: Config) -> Self {
        let policy = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            policy: RwLock::new(policy),
            clients: ClientManager::new(),
            transport_override: None,
        }
    }

    /// Create an invoker driving a caller-supplied transport instead of the
    /// managed HTTP client.
    pub fn with_transport(config: Config, transport: SharedTransport) -> Self {
        let mut invoker = Self::new(config);
        invoker.transport_override = Some(transport);
        invoker
    }

    /// Merge a partial retry-policy override over the current policy.
    /// In-flight calls keep the policy they snapshotted at start.
    pub async fn set_retry_policy(&self, patch: RetryPolicyOverride) {
        let mut guard = self.policy.write().await;
        *guard = guard.merge(patch);
    }

    /// Current retry policy.
    pub async fn retry_policy(&self) -> RetryPolicy {
        *self.policy.read().await
    }

    /// Drop the cached client handle so the next attempt re-reads
    /// configuration. In-flight attempts keep their snapshotted handle.
    pub async fn reset_client(&self) {
        self.clients.reset().await;
    }

    /// Probe upstream availability.
    pub async fn health_check(&self) -> Result<bool> {
        let transport = self.transport().await?;
        transport.health_check().await
    }

    async fn transport(&self) -> Result<SharedTransport> {
        if let Some(transport) = &self.transport_override {
            return Ok(Arc::clone(transport));
        }
        let handle = self.clients.get(&self.config.api).await?;
        Ok(handle)
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Run the prompt and return the validated JSON payload.
    ///
    /// Suspends until success or a terminal failure. Recoverable failures are
    /// consumed by retry and model fallback; if every model exhausts its
    /// attempts the aggregate [`MuseError::Exhausted`] names all tried models
    /// and the last underlying error.
    pub async fn analyze(&self, prompt: &str, expected_fields: &[&str]) -> Result<Value> {
        let models = resolve_models(&self.config.llm.models)?;
        let policy = self.retry_policy().await;
        let mut state = FallbackState::start();
        let mut last_error = String::from("no attempts made");

        loop {
            let model = models[state.model_idx].clone();
            debug!(model = %model, attempt = state.attempt, "invoking model");

            match self.attempt_analyze(&model, prompt, expected_fields).await {
                Ok(data) => {
                    info!(model = %model, attempt = state.attempt, "analysis succeeded");
                    return Ok(data);
                }
                Err(err) if err.is_terminal() => {
                    warn!(model = %model, error = %err, "terminal failure, aborting fallback");
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        model = %model,
                        attempt = state.attempt,
                        category = err.category(),
                        error = %err,
                        "attempt failed"
                    );
                    last_error = err.to_string();

                    match state.on_failure(&policy, models.len()) {
                        Advance::Retry(delay) => {
                            debug!(delay_ms = delay.as_millis() as u64, "retrying after backoff");
                            sleep(delay).await;
                        }
                        Advance::NextModel => {
                            info!(next = %models[state.model_idx], "falling back to next model");
                        }
                        Advance::Exhausted => {
                            return Err(MuseError::Exhausted {
                                models,
                                attempts: policy.attempts_per_model(),
                                last_error,
                            });
                        }
                    }
                }
            }
        }
    }

    async fn attempt_analyze(
        &self,
        model: &str,
        prompt: &str,
        expected_fields: &[&str],
    ) -> Result<Value> {
        let transport = self.transport().await?;

        let mut request = ChatRequest::user(model, prompt, self.config.llm.temperature);
        if supports_json_mode(model) {
            request = request.with_json_mode();
        }

        let raw = transport.complete(&request).await?;
        if self.config.llm.debug {
            debug!(model, raw = ?raw, "raw upstream response");
        }

        let text = normalize(raw, model)?;
        let outcome = validate_payload(&text, expected_fields);

        match (outcome.is_valid, outcome.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(MuseError::Validation {
                errors: outcome.errors,
            }),
        }
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Run the prompt as a streamed generation, invoking `on_fragment` once
    /// per content fragment in arrival order.
    ///
    /// Retry and model fallback follow the same policy as [`Self::analyze`];
    /// an attempt that completes without delivering any fragment counts as a
    /// recoverable failure. On terminal failure `on_error` is invoked exactly
    /// once with the aggregate error; it is never raised synchronously.
    pub async fn generate_stream<F, E>(&self, prompt: &str, mut on_fragment: F, on_error: E)
    where
        F: FnMut(&str),
        E: FnOnce(MuseError),
    {
        let models = match resolve_models(&self.config.llm.models) {
            Ok(models) => models,
            Err(err) => {
                on_error(err);
                return;
            }
        };
        let policy = self.retry_policy().await;
        let mut state = FallbackState::start();
        let mut last_error = String::from("no attempts made");

        loop {
            let model = models[state.model_idx].clone();
            debug!(model = %model, attempt = state.attempt, "opening stream");

            match self.attempt_stream(&model, prompt, &mut on_fragment).await {
                Ok(()) => {
                    info!(model = %model, attempt = state.attempt, "stream completed");
                    return;
                }
                Err(err) if err.is_terminal() => {
                    warn!(model = %model, error = %err, "terminal failure, aborting stream");
                    on_error(err);
                    return;
                }
                Err(err) => {
                    warn!(
                        model = %model,
                        attempt = state.attempt,
                        category = err.category(),
                        error = %err,
                        "stream attempt failed"
                    );
                    last_error = err.to_string();

                    match state.on_failure(&policy, models.len()) {
                        Advance::Retry(delay) => {
                            debug!(delay_ms = delay.as_millis() as u64, "retrying after backoff");
                            sleep(delay).await;
                        }
                        Advance::NextModel => {
                            info!(next = %models[state.model_idx], "falling back to next model");
                        }
                        Advance::Exhausted => {
                            on_error(MuseError::Exhausted {
                                models,
                                attempts: policy.attempts_per_model(),
                                last_error,
                            });
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn attempt_stream<F>(&self, model: &str, prompt: &str, on_fragment: &mut F) -> Result<()>
    where
        F: FnMut(&str),
    {
        let transport = self.transport().await?;

        let request = ChatRequest::user(model, prompt, self.config.llm.temperature).streaming();
        let mut fragments = transport.stream(&request).await?;

        let mut delivered = 0usize;
        while let Some(item) = fragments.next().await {
            let fragment = item?;
            delivered += 1;
            on_fragment(&fragment);
        }

        if delivered == 0 {
            return Err(MuseError::upstream("stream completed without content"));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
