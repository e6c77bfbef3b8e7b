//! Token counter implementations and the model-aware request estimator.

use crate::types::Message;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// No message-overhead table is known for this model.
    #[error("token estimation is not implemented for model '{0}'")]
    Unsupported(String),
}

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Fast approximation: a fixed number of characters per token.
#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: f64,
}

impl CharacterEstimator {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }
    pub fn with_ratio(r: f64) -> Self {
        Self { chars_per_token: r }
    }
}

impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for CharacterEstimator {
    fn count(&self, text: &str) -> usize {
        (text.chars().count() as f64 / self.chars_per_token).ceil() as usize
    }
}

/// Chat framing overhead of a model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageOverhead {
    pub tokens_per_message: usize,
    /// Every reply is primed with `<|start|>assistant<|message|>`.
    pub reply_priming: usize,
}

const GPT_0301: MessageOverhead = MessageOverhead {
    tokens_per_message: 4,
    reply_priming: 3,
};

const GPT_CHAT: MessageOverhead = MessageOverhead {
    tokens_per_message: 3,
    reply_priming: 3,
};

/// Looks up the framing overhead for `model`.
///
/// Moving aliases (`gpt-3.5-turbo`, `gpt-4`, `gpt-4o-mini`, ...) resolve to their
/// pinned snapshots; anything else is unsupported.
pub fn message_overhead(model: &str) -> Result<MessageOverhead, TokenError> {
    let ml = model.to_lowercase();
    if ml == "gpt-3.5-turbo-0301" {
        Ok(GPT_0301)
    } else if ml.contains("gpt-3.5-turbo") || ml.contains("gpt-4") || ml.contains("ppo") {
        Ok(GPT_CHAT)
    } else {
        Err(TokenError::Unsupported(model.to_string()))
    }
}

static COUNTERS: Lazy<RwLock<HashMap<String, Arc<dyn TokenCounter>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Shared counter for a model, created on first use.
pub fn get_token_counter(model: &str) -> Arc<dyn TokenCounter> {
    let ml = model.to_lowercase();
    if let Ok(c) = COUNTERS.read() {
        if let Some(x) = c.get(&ml) {
            return x.clone();
        }
    }
    let counter: Arc<dyn TokenCounter> = Arc::new(CharacterEstimator::new());
    if let Ok(mut c) = COUNTERS.write() {
        c.insert(ml, counter.clone());
    }
    counter
}

/// Estimates how many tokens `conversation` costs as a prompt to `model`.
///
/// Purely diagnostic: callers log the result and carry on when the model is
/// unsupported.
pub fn estimate(conversation: &[Message], model: &str) -> Result<usize, TokenError> {
    let overhead = message_overhead(model)?;
    let counter = get_token_counter(model);
    let mut total = 0;
    for message in conversation {
        total += overhead.tokens_per_message;
        total += counter.count(message.role.as_str());
        total += counter.count(&message.content);
    }
    Ok(total + overhead.reply_priming)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_estimator_rounds_up() {
        let c = CharacterEstimator::new();
        assert_eq!(c.count(""), 0);
        assert_eq!(c.count("abc"), 1);
        assert_eq!(c.count("abcdefgh"), 2);
        assert_eq!(c.count("abcdefghi"), 3);
    }

    #[test]
    fn estimate_for_gpt4_family() {
        // user -> 1 token, "Hello" -> 2 tokens, framing 3, priming 3
        let conv = vec![Message::user("Hello")];
        assert_eq!(estimate(&conv, "gpt-4-0613"), Ok(9));
        assert_eq!(estimate(&conv, "gpt-4o"), Ok(9));
    }

    #[test]
    fn legacy_snapshot_uses_larger_framing() {
        let conv = vec![Message::user("Hello")];
        assert_eq!(estimate(&conv, "gpt-3.5-turbo-0301"), Ok(10));
    }

    #[test]
    fn empty_conversation_costs_priming_only() {
        assert_eq!(estimate(&[], "gpt-3.5-turbo"), Ok(3));
    }

    #[test]
    fn unknown_model_is_unsupported() {
        let conv = vec![Message::user("Hello")];
        assert_eq!(
            estimate(&conv, "llama3.1"),
            Err(TokenError::Unsupported("llama3.1".into()))
        );
    }
}
