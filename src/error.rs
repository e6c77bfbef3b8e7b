use crate::cache::CacheError;
use crate::providers::ProviderError;
use std::fmt;
use thiserror::Error;

/// Structured error context for configuration and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Configuration key or parameter that caused the error (e.g., "retry.max_attempts")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "registry", "config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure taxonomy shared by per-attempt errors and terminal call outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Malformed input rejected by the backend. Never retried.
    InvalidRequest,
    /// Backend throttling. Retried with backoff.
    RateLimited,
    /// Recoverable backend error, including timeouts. Retried with backoff.
    Transient,
    /// Transport-level or unexpected error. Retried as transient.
    Unclassified,
    /// The attempt budget ran out.
    AttemptsExhausted,
    /// The adapter does not support the requested operation.
    Capability,
    /// Unregistered provider, missing credential or invalid numeric setting.
    Configuration,
    /// The response cache could not be read or written.
    Cache,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Unclassified => "unclassified",
            Self::AttemptsExhausted => "attempts_exhausted",
            Self::Capability => "capability",
            Self::Configuration => "configuration",
            Self::Cache => "cache",
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient | Self::Unclassified)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unified error type for the gateway.
///
/// Per-call failures (invalid request, exhausted attempts, capability) are
/// returned as values; only configuration errors are meant to stop a process,
/// and only at startup.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Invalid request rejected by '{provider}' on attempt {attempt}: {message}")]
    InvalidRequest {
        provider: String,
        attempt: u32,
        message: String,
    },

    #[error("Failed to get a response after {attempts} attempts in {elapsed_ms}ms: {last_error}")]
    AttemptsExhausted {
        attempts: u32,
        elapsed_ms: u64,
        last_error: String,
    },

    #[error("Provider '{provider}' does not support {operation}")]
    Capability {
        provider: String,
        operation: &'static str,
    },

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Configuration error for a provider identifier with no registered adapter.
    pub fn unregistered_provider(id: &str) -> Self {
        Self::configuration_with_context(
            format!("provider '{}' is not registered", id),
            ErrorContext::new()
                .with_field_path("provider")
                .with_source("registry"),
        )
    }

    /// Bucket of the failure taxonomy this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Configuration { .. } | Error::Yaml(_) => FailureKind::Configuration,
            Error::InvalidRequest { .. } => FailureKind::InvalidRequest,
            Error::AttemptsExhausted { .. } => FailureKind::AttemptsExhausted,
            Error::Capability { .. } => FailureKind::Capability,
            Error::Provider(e) => e.kind(),
            Error::Cache(_) => FailureKind::Cache,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unsupported {
                provider,
                operation,
            } => Error::Capability {
                provider,
                operation,
            },
            ProviderError::MissingCredential { provider, setting } => {
                Error::configuration_with_context(
                    format!("provider '{}' has no credential configured", provider),
                    ErrorContext::new()
                        .with_field_path(setting)
                        .with_source("provider"),
                )
            }
            other => Error::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_provider_names_identifier() {
        let err = Error::unregistered_provider("mystery");
        assert_eq!(err.kind(), FailureKind::Configuration);
        assert!(err.to_string().contains("'mystery'"));
        assert_eq!(err.context().unwrap().source.as_deref(), Some("registry"));
    }

    #[test]
    fn unsupported_provider_error_becomes_capability() {
        let err: Error = ProviderError::Unsupported {
            provider: "local".into(),
            operation: "embeddings",
        }
        .into();
        assert_eq!(err.kind(), FailureKind::Capability);
        assert_eq!(err.to_string(), "Provider 'local' does not support embeddings");
    }

    #[test]
    fn non_provider_failures_land_in_their_own_bucket() {
        let yaml = serde_yaml::from_str::<u32>("[not a number").unwrap_err();
        assert_eq!(Error::from(yaml).kind(), FailureKind::Configuration);

        let cache = Error::from(CacheError::UnsupportedVersion {
            path: "cache.json".into(),
            found: 9,
        });
        assert_eq!(cache.kind(), FailureKind::Cache);
        assert!(!cache.is_retryable());
    }

    #[test]
    fn retryable_kinds() {
        assert!(FailureKind::RateLimited.is_retryable());
        assert!(FailureKind::Transient.is_retryable());
        assert!(FailureKind::Unclassified.is_retryable());
        assert!(!FailureKind::InvalidRequest.is_retryable());
        assert!(!FailureKind::Capability.is_retryable());
        assert!(!FailureKind::Configuration.is_retryable());
    }
}
