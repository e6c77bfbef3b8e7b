//! OpenAI chat-completions adapter (`primary`).
//!
//! The body builder and the reply unwrapping are shared with the Azure
//! adapter, which speaks the same wire format over different URLs.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::OpenAiSettings;
use crate::transport::HttpTransport;
use crate::types::params::DEFAULT_TIMEOUT;
use crate::types::{NormalizedResponse, Usage};

use super::{wire_messages, ApiKey, ChatRequest, ProviderAdapter, ProviderError, WireRequest, PRIMARY};

#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    base_url: String,
    api_key: Option<ApiKey>,
    embedding_model: String,
    transport: HttpTransport,
}

impl OpenAiAdapter {
    pub fn new(
        settings: &OpenAiSettings,
        embedding_model: impl Into<String>,
        transport: HttpTransport,
    ) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            embedding_model: embedding_model.into(),
            transport,
        }
    }

    fn auth_headers(&self) -> Result<Vec<(String, String)>, ProviderError> {
        let key = self.api_key.as_ref().ok_or(ProviderError::MissingCredential {
            provider: PRIMARY.to_string(),
            setting: "openai.api_key",
        })?;
        Ok(vec![(
            "Authorization".to_string(),
            format!("Bearer {}", key.expose()),
        )])
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider_id(&self) -> &str {
        PRIMARY
    }

    fn build_wire_request(&self, request: &ChatRequest<'_>) -> Result<WireRequest, ProviderError> {
        Ok(WireRequest {
            url: format!("{}/chat/completions", self.base_url),
            headers: self.auth_headers()?,
            body: chat_body(request),
            timeout: request.params.timeout,
        })
    }

    async fn invoke(&self, wire: &WireRequest) -> Result<Value, ProviderError> {
        self.transport.post_json(wire).await
    }

    fn extract(&self, model: &str, raw: Value) -> Result<NormalizedResponse, ProviderError> {
        extract_chat(model, raw)
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let wire = WireRequest {
            url: format!("{}/embeddings", self.base_url),
            headers: self.auth_headers()?,
            body: json!({ "input": [text], "model": self.embedding_model }),
            timeout: DEFAULT_TIMEOUT,
        };
        let raw = self.transport.post_json(&wire).await?;
        extract_embedding(&raw)
    }
}

/// Chat-completions request body.
pub(crate) fn chat_body(request: &ChatRequest<'_>) -> Value {
    let p = request.params;
    let mut body = json!({
        "model": request.model,
        "messages": wire_messages(request.messages),
        "temperature": p.temperature,
        "max_tokens": p.max_tokens,
        "top_p": p.top_p,
        "frequency_penalty": p.frequency_penalty,
        "presence_penalty": p.presence_penalty,
        "n": p.n,
        "stream": false,
    });
    if !p.stop.is_empty() {
        body["stop"] = json!(p.stop);
    }
    body
}

/// Unwraps `choices[0].message` from a chat-completions reply.
pub(crate) fn extract_chat(model: &str, raw: Value) -> Result<NormalizedResponse, ProviderError> {
    let content = raw
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::malformed("missing choices[0].message.content"))?
        .to_string();

    let finish_reason = raw
        .pointer("/choices/0/finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);
    let usage = raw.get("usage").map(|u| Usage {
        prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
    });
    let model = raw
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or(model)
        .to_string();

    Ok(NormalizedResponse::text(model, content)
        .with_finish_reason(finish_reason)
        .with_usage(usage)
        .with_raw(raw))
}

pub(crate) fn extract_embedding(raw: &Value) -> Result<Vec<f32>, ProviderError> {
    raw.pointer("/data/0/embedding")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ProviderError::malformed("missing data[0].embedding"))?
        .iter()
        .map(|x| {
            x.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| ProviderError::malformed("non-numeric embedding component"))
        })
        .collect()
}
