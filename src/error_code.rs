//! Canonical backend error codes and their retry semantics.
//!
//! Backends report failures through an HTTP status and, usually, an error
//! `code`/`type` string in the body. Both are folded into a
//! [`StandardErrorCode`], which in turn decides the [`FailureKind`] the
//! dispatch loop acts on.
//!
//! | Code         | Retried | Failure kind      |
//! |--------------|---------|-------------------|
//! | E1001/E1004/E1005 | no | invalid request |
//! | E1002/E1003  | yes     | unclassified      |
//! | E2001/E2002  | yes     | rate limited      |
//! | E3001..E3003 | yes     | transient         |
//! | E9999        | yes     | unclassified      |
//!
//! ## Example
//!
//! ```rust
//! use llm_gateway::error_code::StandardErrorCode;
//! use llm_gateway::FailureKind;
//!
//! let code = StandardErrorCode::classify(429, None);
//! assert_eq!(code.code(), "E2001");
//! assert_eq!(code.failure_kind(), FailureKind::RateLimited);
//! ```

use std::fmt;

use crate::error::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardErrorCode {
    /// E1001: Malformed request, invalid parameters, or missing required fields
    InvalidRequest,
    /// E1002: Invalid, expired, or missing API key
    Authentication,
    /// E1003: Valid credentials but insufficient permissions
    PermissionDenied,
    /// E1004: Requested model or deployment does not exist
    NotFound,
    /// E1005: Input exceeds context window or payload size limit
    RequestTooLarge,
    /// E2001: Request rate limit exceeded
    RateLimited,
    /// E2002: Usage quota reached
    QuotaExhausted,
    /// E3001: Internal server error on provider side
    ServerError,
    /// E3002: Provider service temporarily overloaded
    Overloaded,
    /// E3003: Request timed out before response received
    Timeout,
    /// E9999: Error could not be classified
    Unknown,
}

impl StandardErrorCode {
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "E1001",
            Self::Authentication => "E1002",
            Self::PermissionDenied => "E1003",
            Self::NotFound => "E1004",
            Self::RequestTooLarge => "E1005",
            Self::RateLimited => "E2001",
            Self::QuotaExhausted => "E2002",
            Self::ServerError => "E3001",
            Self::Overloaded => "E3002",
            Self::Timeout => "E3003",
            Self::Unknown => "E9999",
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Failure bucket the dispatch loop uses for this code.
    ///
    /// Authentication and permission failures land in `Unclassified`: they are
    /// logged and retried like any unexpected error, matching how credentials
    /// rotated mid-run eventually recover.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest | Self::NotFound | Self::RequestTooLarge => {
                FailureKind::InvalidRequest
            }
            Self::RateLimited | Self::QuotaExhausted => FailureKind::RateLimited,
            Self::ServerError | Self::Overloaded | Self::Timeout => FailureKind::Transient,
            Self::Authentication | Self::PermissionDenied | Self::Unknown => {
                FailureKind::Unclassified
            }
        }
    }

    /// Maps a provider error code/type string to the corresponding code.
    ///
    /// Supports the standard names and the aliases used by OpenAI-compatible
    /// and Azure backends (`context_length_exceeded`, `content_filter`,
    /// `DeploymentNotFound`, ...).
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let code = match provider_code {
            "invalid_request" | "invalid_request_error" | "content_filter"
            | "invalid_value" | "unsupported_parameter" => Self::InvalidRequest,
            "authentication" | "invalid_api_key" | "authentication_error" | "401" => {
                Self::Authentication
            }
            "permission_denied" | "permission_error" => Self::PermissionDenied,
            "not_found" | "model_not_found" | "DeploymentNotFound" => Self::NotFound,
            "request_too_large" | "context_length_exceeded" => Self::RequestTooLarge,
            "rate_limited" | "rate_limit_exceeded" | "429" => Self::RateLimited,
            "quota_exhausted" | "insufficient_quota" => Self::QuotaExhausted,
            "server_error" | "internal_error" => Self::ServerError,
            "overloaded" | "overloaded_error" | "engine_overloaded" => Self::Overloaded,
            "timeout" => Self::Timeout,
            _ => return None,
        };
        Some(code)
    }

    /// Maps an HTTP status code to the most likely code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::Timeout,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            500 | 502 => Self::ServerError,
            503 | 529 => Self::Overloaded,
            504 => Self::Timeout,
            s if s >= 500 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Combines the status with an optional body code; a recognized body code
    /// wins because it is more specific (e.g. a 400 carrying
    /// `rate_limit_exceeded`).
    pub fn classify(status: u16, provider_code: Option<&str>) -> Self {
        provider_code
            .and_then(Self::from_provider_code)
            .unwrap_or_else(|| Self::from_http_status(status))
    }
}

impl fmt::Display for StandardErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(StandardErrorCode::from_http_status(400), StandardErrorCode::InvalidRequest);
        assert_eq!(StandardErrorCode::from_http_status(429), StandardErrorCode::RateLimited);
        assert_eq!(StandardErrorCode::from_http_status(503), StandardErrorCode::Overloaded);
        assert_eq!(StandardErrorCode::from_http_status(507), StandardErrorCode::ServerError);
        assert_eq!(StandardErrorCode::from_http_status(418), StandardErrorCode::Unknown);
    }

    #[test]
    fn body_code_overrides_status() {
        let code = StandardErrorCode::classify(400, Some("rate_limit_exceeded"));
        assert_eq!(code, StandardErrorCode::RateLimited);
        let code = StandardErrorCode::classify(500, Some("not-a-known-code"));
        assert_eq!(code, StandardErrorCode::ServerError);
    }

    #[test]
    fn failure_kinds() {
        assert_eq!(
            StandardErrorCode::RequestTooLarge.failure_kind(),
            FailureKind::InvalidRequest
        );
        assert_eq!(StandardErrorCode::QuotaExhausted.failure_kind(), FailureKind::RateLimited);
        assert_eq!(StandardErrorCode::Timeout.failure_kind(), FailureKind::Transient);
        assert_eq!(StandardErrorCode::Authentication.failure_kind(), FailureKind::Unclassified);
    }
}
