//! AI Invocation Layer
//!
//! Resilient invocation of OpenAI-compatible chat-completion endpoints.
//!
//! ## Modules
//!
//! - `client`: lazily constructed shared client handle and HTTP transport
//! - `models`: ordered model-list resolution (primary + fallbacks)
//! - `retry`: backoff policy and the model × attempt fallback state machine
//! - `response`: raw response classification and text extraction
//! - `validation`: expected-field validation of parsed payloads
//! - `invoker`: the orchestrator tying it all together

pub mod client;
pub mod invoker;
pub mod models;
pub mod response;
pub mod retry;
pub mod validation;

pub use client::{
    ChatMessage, ChatRequest, ChatTransport, ClientManager, FragmentStream, HttpTransport,
    ResponseFormat, SharedTransport,
};
pub use invoker::Invoker;
pub use models::{resolve_models, supports_json_mode};
pub use response::{ChatCompletion, RawResponse, normalize};
pub use retry::{RetryPolicy, RetryPolicyOverride};
pub use validation::{ValidationOutcome, validate_payload};
