//! Provider-agnostic response shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::MessageRole;

/// Result payload, tagged by the adapter that produced it.
///
/// Adapters decide the variant from their own configuration; callers never
/// need to inspect the value to find out which one they got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseContent {
    Text(String),
    Structured(Value),
}

impl ResponseContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseContent::Text(s) => Some(s),
            ResponseContent::Structured(_) => None,
        }
    }

    /// Text rendering of either variant; structured payloads become compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            ResponseContent::Text(s) => s.clone(),
            ResponseContent::Structured(v) => v.to_string(),
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// What every adapter returns and what the cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub role: MessageRole,
    pub content: ResponseContent,
    /// Model reported by the backend, or the resolved model when it reports none.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Raw provider payload, kept for debugging.
    #[serde(default)]
    pub raw: Value,
}

impl NormalizedResponse {
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: ResponseContent::Text(content.into()),
            model: model.into(),
            finish_reason: None,
            usage: None,
            raw: Value::Null,
        }
    }

    pub fn structured(model: impl Into<String>, content: Value) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: ResponseContent::Structured(content),
            model: model.into(),
            finish_reason: None,
            usage: None,
            raw: Value::Null,
        }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_finish_reason(mut self, reason: Option<String>) -> Self {
        self.finish_reason = reason;
        self
    }

    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn text_content(&self) -> Option<&str> {
        self.content.as_text()
    }
}
