//! Provider 适配层：在统一请求/响应与各后端线协议之间转换
//!
//! Provider adapter layer. Each backend gets one [`ProviderAdapter`] that
//! translates the canonical request into its wire format, performs the call,
//! and unwraps the reply into a [`NormalizedResponse`]. The dispatcher only
//! ever talks to `Arc<dyn ProviderAdapter>`.
//!
//! | Identifier   | Adapter           | Wire format |
//! |--------------|-------------------|-------------|
//! | `primary`    | [`OpenAiAdapter`] | OpenAI chat completions |
//! | `enterprise` | [`AzureAdapter`]  | OpenAI chat over Azure deployment URLs |
//! | `local`      | [`OllamaAdapter`] | Ollama `/api/chat` envelope |

pub mod azure;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::FailureKind;
use crate::error_code::StandardErrorCode;
use crate::types::{Message, NormalizedResponse, RequestParameters};

pub use azure::AzureAdapter;
pub use ollama::{OllamaAdapter, ResponseShape};
pub use openai::OpenAiAdapter;

pub const PRIMARY: &str = "primary";
pub const ENTERPRISE: &str = "enterprise";
pub const LOCAL: &str = "local";

/// Canonical chat request handed to an adapter.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// Model after adapter resolution.
    pub model: &'a str,
    pub messages: &'a [Message],
    pub params: &'a RequestParameters,
}

/// Provider-specific HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub timeout: Duration,
}

/// Credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Outcome of a single failed adapter operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("invalid request{}: {message}", format_status(.status))]
    InvalidRequest { status: Option<u16>, message: String },

    #[error("rate limited{}: {message}", format_status(.status))]
    RateLimited {
        status: Option<u16>,
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("transient failure{}: {message}", format_status(.status))]
    Transient { status: Option<u16>, message: String },

    #[error("{message}")]
    Unclassified { message: String },

    #[error("provider '{provider}' does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    #[error("provider '{provider}' is missing setting '{setting}'")]
    MissingCredential {
        provider: String,
        setting: &'static str,
    },
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl ProviderError {
    /// Builds the error variant matching a canonical error code.
    pub fn from_code(
        code: StandardErrorCode,
        status: Option<u16>,
        message: impl Into<String>,
        retry_after_ms: Option<u64>,
    ) -> Self {
        let message = message.into();
        match code.failure_kind() {
            FailureKind::InvalidRequest => ProviderError::InvalidRequest { status, message },
            FailureKind::RateLimited => ProviderError::RateLimited {
                status,
                message,
                retry_after_ms,
            },
            FailureKind::Transient => ProviderError::Transient { status, message },
            _ => ProviderError::Unclassified {
                message: format!("{} ({}): {}", code.name(), code.code(), message),
            },
        }
    }

    pub fn unsupported(provider: &str, operation: &'static str) -> Self {
        ProviderError::Unsupported {
            provider: provider.to_string(),
            operation,
        }
    }

    /// Reply arrived but does not have the expected shape.
    pub fn malformed(message: impl Into<String>) -> Self {
        ProviderError::Unclassified {
            message: format!("malformed response: {}", message.into()),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::InvalidRequest { .. } => FailureKind::InvalidRequest,
            ProviderError::RateLimited { .. } => FailureKind::RateLimited,
            ProviderError::Transient { .. } => FailureKind::Transient,
            ProviderError::Unclassified { .. } => FailureKind::Unclassified,
            ProviderError::Unsupported { .. } => FailureKind::Capability,
            ProviderError::MissingCredential { .. } => FailureKind::Configuration,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Backend-specific translator between canonical shapes and a wire protocol.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + fmt::Debug {
    /// Identifier the adapter is registered under by default.
    fn provider_id(&self) -> &str;

    /// Model that will actually serve a request for `requested`.
    fn resolve_model(&self, requested: &str) -> String {
        requested.to_string()
    }

    fn build_wire_request(&self, request: &ChatRequest<'_>) -> Result<WireRequest, ProviderError>;

    /// Performs the network call.
    async fn invoke(&self, wire: &WireRequest) -> Result<Value, ProviderError>;

    /// Unwraps a raw reply into the normalized shape.
    fn extract(&self, model: &str, raw: Value) -> Result<NormalizedResponse, ProviderError>;

    fn supports_embeddings(&self) -> bool {
        false
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::unsupported(self.provider_id(), "embeddings"))
    }

    /// One full attempt: translate, invoke, extract.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<NormalizedResponse, ProviderError> {
        let wire = self.build_wire_request(request)?;
        let raw = self.invoke(&wire).await?;
        self.extract(request.model, raw)
    }
}

pub(crate) fn wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
        .collect()
}
