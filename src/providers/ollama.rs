//! Locally hosted Ollama adapter (`local`).
//!
//! Ollama has its own envelope: sampling knobs go under `options`, the reply
//! sits in `message.content`, and there is no equivalent for `n` or the
//! frequency/presence penalties. Those are dropped with a debug log instead of
//! failing the call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;
use tracing::debug;

use crate::config::OllamaSettings;
use crate::transport::HttpTransport;
use crate::types::{NormalizedResponse, Usage};

use super::{wire_messages, ChatRequest, ProviderAdapter, ProviderError, WireRequest, LOCAL};

/// What the local adapter hands back to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// Plain assistant text.
    #[default]
    Text,
    /// Agent envelope `{cognitive_state, actions}` wrapped around the reply.
    CognitiveEnvelope,
}

impl FromStr for ResponseShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ResponseShape::Text),
            "cognitive_envelope" => Ok(ResponseShape::CognitiveEnvelope),
            other => Err(format!(
                "unknown response shape '{}' (expected text or cognitive_envelope)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    base_url: String,
    endpoint: String,
    model: Option<String>,
    shape: ResponseShape,
    transport: HttpTransport,
}

impl OllamaAdapter {
    pub fn new(settings: &OllamaSettings, transport: HttpTransport) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            endpoint: settings.endpoint.trim_start_matches('/').to_string(),
            model: settings.model.clone(),
            shape: settings.response_shape,
            transport,
        }
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn provider_id(&self) -> &str {
        LOCAL
    }

    fn resolve_model(&self, requested: &str) -> String {
        self.model.clone().unwrap_or_else(|| requested.to_string())
    }

    fn build_wire_request(&self, request: &ChatRequest<'_>) -> Result<WireRequest, ProviderError> {
        let p = request.params;
        if p.n != 1 || p.frequency_penalty != 0.0 || p.presence_penalty != 0.0 {
            debug!(
                provider = LOCAL,
                n = p.n,
                frequency_penalty = p.frequency_penalty,
                presence_penalty = p.presence_penalty,
                "Ignoring parameters the local backend does not support"
            );
        }

        let mut options = json!({
            "temperature": p.temperature,
            "top_p": p.top_p,
            "num_predict": p.max_tokens,
        });
        if !p.stop.is_empty() {
            options["stop"] = json!(p.stop);
        }

        Ok(WireRequest {
            url: format!("{}/{}", self.base_url, self.endpoint),
            headers: Vec::new(),
            body: json!({
                "model": request.model,
                "messages": wire_messages(request.messages),
                "stream": false,
                "options": options,
            }),
            timeout: p.timeout,
        })
    }

    async fn invoke(&self, wire: &WireRequest) -> Result<Value, ProviderError> {
        self.transport.post_json(wire).await
    }

    fn extract(&self, model: &str, raw: Value) -> Result<NormalizedResponse, ProviderError> {
        let content = raw
            .pointer("/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::malformed("missing message.content"))?
            .to_string();

        let model = raw
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or(model)
            .to_string();
        let finish_reason = raw
            .get("done_reason")
            .and_then(|v| v.as_str())
            .map(String::from);
        let usage = match (
            raw.get("prompt_eval_count").and_then(|v| v.as_u64()),
            raw.get("eval_count").and_then(|v| v.as_u64()),
        ) {
            (None, None) => None,
            (prompt, completion) => {
                let (p, c) = (prompt.unwrap_or(0), completion.unwrap_or(0));
                Some(Usage {
                    prompt_tokens: p,
                    completion_tokens: c,
                    total_tokens: p + c,
                })
            }
        };

        let response = match self.shape {
            ResponseShape::Text => NormalizedResponse::text(model, content),
            ResponseShape::CognitiveEnvelope => {
                NormalizedResponse::structured(model, cognitive_envelope(&content))
            }
        };
        Ok(response
            .with_finish_reason(finish_reason)
            .with_usage(usage)
            .with_raw(raw))
    }
}

fn default_cognitive_state() -> Value {
    json!({
        "attention": "focused",
        "emotion": "neutral",
        "thoughts": "Processing the conversation",
        "goals": ["Respond appropriately to the situation"],
    })
}

/// Wraps bare text in the agent envelope.
///
/// Replies that already are an envelope pass through; a JSON object carrying
/// actions but no `cognitive_state` gets the default state added.
fn cognitive_envelope(content: &str) -> Value {
    if let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(content) {
        if obj.contains_key("cognitive_state") {
            return Value::Object(obj);
        }
        if obj.contains_key("action") || obj.contains_key("actions") {
            obj.insert("cognitive_state".to_string(), default_cognitive_state());
            return Value::Object(obj);
        }
    }

    let mut envelope = Map::new();
    envelope.insert("cognitive_state".to_string(), default_cognitive_state());
    envelope.insert(
        "actions".to_string(),
        json!([{ "action_type": "talk", "target": null, "content": content }]),
    );
    Value::Object(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, RequestParameters, ResponseContent};

    fn adapter(shape: ResponseShape, model: Option<&str>) -> OllamaAdapter {
        let settings = OllamaSettings {
            model: model.map(String::from),
            response_shape: shape,
            ..OllamaSettings::default()
        };
        OllamaAdapter::new(&settings, HttpTransport::new().unwrap())
    }

    #[test]
    fn configured_model_wins() {
        assert_eq!(adapter(ResponseShape::Text, Some("llama3.1")).resolve_model("gpt-4"), "llama3.1");
        assert_eq!(adapter(ResponseShape::Text, None).resolve_model("gpt-4"), "gpt-4");
    }

    #[test]
    fn unsupported_parameters_are_dropped() {
        let a = adapter(ResponseShape::Text, None);
        let params = RequestParameters::new("llama3.1")
            .with_samples(3)
            .with_penalties(1.0, 1.0)
            .with_max_tokens(64);
        let messages = vec![Message::user("Hello")];
        let wire = a
            .build_wire_request(&ChatRequest { model: "llama3.1", messages: &messages, params: &params })
            .unwrap();

        assert_eq!(wire.url, "http://localhost:11434/api/chat");
        assert_eq!(wire.body["options"]["num_predict"], 64);
        assert_eq!(wire.body["stream"], false);
        assert!(wire.body.get("n").is_none());
        assert!(wire.body["options"].get("frequency_penalty").is_none());
    }

    #[test]
    fn text_shape_unwraps_message() {
        let raw = json!({
            "model": "llama3.1",
            "message": {"role": "assistant", "content": "Hi there"},
            "done_reason": "stop",
            "prompt_eval_count": 7,
            "eval_count": 3
        });
        let r = adapter(ResponseShape::Text, None).extract("llama3.1", raw).unwrap();
        assert_eq!(r.text_content(), Some("Hi there"));
        assert_eq!(r.usage.unwrap().total_tokens, 10);
        assert_eq!(r.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn envelope_shape_wraps_plain_text() {
        let raw = json!({"message": {"content": "Hello, friend"}});
        let r = adapter(ResponseShape::CognitiveEnvelope, None).extract("m", raw).unwrap();
        match r.content {
            ResponseContent::Structured(v) => {
                assert_eq!(v["actions"][0]["action_type"], "talk");
                assert_eq!(v["actions"][0]["content"], "Hello, friend");
                assert!(v["actions"][0]["target"].is_null());
                assert_eq!(v["cognitive_state"]["emotion"], "neutral");
            }
            other => panic!("expected structured content, got {:?}", other),
        }
    }

    #[test]
    fn envelope_passes_through_or_completes_json_replies() {
        let full = r#"{"cognitive_state":{"attention":"x"},"actions":[]}"#;
        assert_eq!(cognitive_envelope(full)["cognitive_state"]["attention"], "x");

        let partial = cognitive_envelope(r#"{"action":{"type":"THINK"}}"#);
        assert_eq!(partial["action"]["type"], "THINK");
        assert_eq!(partial["cognitive_state"]["attention"], "focused");
    }

    #[tokio::test]
    async fn embeddings_are_unsupported() {
        let err = adapter(ResponseShape::Text, None).embed("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { operation: "embeddings", .. }));
        assert!(!adapter(ResponseShape::Text, None).supports_embeddings());
    }

    #[test]
    fn shape_parses_from_config_value() {
        assert_eq!("cognitive_envelope".parse::<ResponseShape>(), Ok(ResponseShape::CognitiveEnvelope));
        assert!("xml".parse::<ResponseShape>().is_err());
    }
}
