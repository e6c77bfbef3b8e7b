use crate::error_code::StandardErrorCode;
use crate::providers::{ProviderError, WireRequest};
use crate::{Error, ErrorContext, Result};
use reqwest::header::HeaderMap;
use reqwest::Proxy;
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Pooled HTTP client that performs adapter invocations and classifies
/// their failures.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(
                env::var("LLM_GATEWAY_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("LLM_GATEWAY_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        if let Ok(proxy_url) = env::var("LLM_GATEWAY_PROXY_URL") {
            let proxy = Proxy::all(&proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy URL: {}", e),
                    ErrorContext::new()
                        .with_field_path("LLM_GATEWAY_PROXY_URL")
                        .with_source("transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("failed to build HTTP client: {}", e),
                ErrorContext::new().with_source("transport"),
            )
        })?;
        Ok(Self { client })
    }

    /// POSTs the wire request and returns the decoded JSON body.
    ///
    /// The request timeout comes from the wire request; hitting it is a
    /// transient failure.
    pub async fn post_json(&self, request: &WireRequest) -> std::result::Result<Value, ProviderError> {
        let request_id = Uuid::new_v4().to_string();
        let mut req = self
            .client
            .post(&request.url)
            .json(&request.body)
            .timeout(request.timeout)
            .header("x-request-id", &request_id);
        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        debug!(url = %request.url, request_id = %request_id, "Sending request");
        let response = req.send().await.map_err(|e| classify_transport(e, request.timeout))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| ProviderError::Unclassified {
                message: format!("response body is not valid JSON: {}", e),
            });
        }

        let retry_after_ms = retry_after_ms(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body, retry_after_ms))
    }
}

fn classify_transport(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Transient {
            status: None,
            message: format!("request timed out after {}ms", timeout.as_millis()),
        }
    } else {
        ProviderError::Unclassified {
            message: err.to_string(),
        }
    }
}

/// Turns a non-success HTTP response into a classified provider error.
///
/// Understands both `{"error": {"message", "type", "code"}}` bodies
/// (OpenAI/Azure) and `{"error": "message"}` bodies (Ollama).
pub(crate) fn classify_status(status: u16, body: &str, retry_after_ms: Option<u64>) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let provider_code = error.and_then(|e| {
        e.get("code")
            .and_then(|c| c.as_str())
            .or_else(|| e.get("type").and_then(|t| t.as_str()))
    });
    let message = error
        .and_then(|e| {
            e.as_str()
                .or_else(|| e.get("message").and_then(|m| m.as_str()))
        })
        .map(String::from)
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                body.chars().take(512).collect()
            }
        });

    let code = StandardErrorCode::classify(status, provider_code);
    ProviderError::from_code(code, Some(status), message, retry_after_ms)
}

/// Best-effort parsing of the `Retry-After: <seconds>` header.
fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    let secs: u64 = raw.parse().ok()?;
    Some(secs.saturating_mul(1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    #[test]
    fn openai_error_body_is_classified_by_code() {
        let body = r#"{"error":{"message":"too long","type":"invalid_request_error","code":"context_length_exceeded"}}"#;
        let err = classify_status(400, body, None);
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn rate_limit_keeps_retry_after() {
        let err = classify_status(429, r#"{"error":{"message":"slow down"}}"#, Some(2000));
        match err {
            ProviderError::RateLimited { retry_after_ms, .. } => {
                assert_eq!(retry_after_ms, Some(2000))
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn ollama_error_string_and_plain_bodies() {
        let err = classify_status(500, r#"{"error":"model crashed"}"#, None);
        assert_eq!(err.kind(), FailureKind::Transient);
        assert!(err.to_string().contains("model crashed"));

        let err = classify_status(502, "", None);
        assert!(err.to_string().contains("HTTP 502"));
    }
}
