//! Cache key generation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::CacheError;
use crate::types::{Message, RequestParameters};

/// Fingerprint of a request: the SHA-256 of its canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub model: Option<String>,
}

#[derive(Serialize)]
struct Fingerprint<'a> {
    model: &'a str,
    parameters: &'a RequestParameters,
    messages: &'a [Message],
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Derives the key of (resolved model, parameters, conversation).
    ///
    /// The fingerprint goes through `serde_json::Value` first so object keys
    /// come out sorted; every parameter and every turn, in order, contributes.
    pub fn compute(
        model: &str,
        parameters: &RequestParameters,
        conversation: &[Message],
    ) -> Result<Self, CacheError> {
        let fingerprint = Fingerprint {
            model,
            parameters,
            messages: conversation,
        };
        let canonical = serde_json::to_value(&fingerprint)
            .and_then(|v| serde_json::to_string(&v))
            .map_err(CacheError::Serialization)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Ok(CacheKey::new(hash).with_model(model))
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn conv() -> Vec<Message> {
        vec![Message::system("be terse"), Message::user("Hello")]
    }

    fn key(model: &str, p: &RequestParameters, c: &[Message]) -> CacheKey {
        CacheKey::compute(model, p, c).unwrap()
    }

    #[test]
    fn identical_requests_share_a_key() {
        let p = RequestParameters::new("m1");
        assert_eq!(key("m1", &p, &conv()), key("m1", &p.clone(), &conv()));
        assert_eq!(key("m1", &p, &conv()).hash.len(), 64);
    }

    #[test]
    fn every_parameter_contributes() {
        let base = RequestParameters::new("m1");
        let k = key("m1", &base, &conv());
        let variants = vec![
            base.clone().with_model("m2"),
            base.clone().with_temperature(0.31),
            base.clone().with_max_tokens(1023),
            base.clone().with_top_p(0.9),
            base.clone().with_penalties(0.1, 0.0),
            base.clone().with_penalties(0.0, 0.1),
            base.clone().with_stop(vec!["\n".into()]),
            base.clone().with_samples(2),
            base.clone().with_timeout(Duration::from_secs(31)),
            base.clone().with_max_attempts(4),
            base.clone().with_backoff(Duration::from_secs(1), 5.0),
            base.clone().with_backoff(Duration::from_millis(500), 2.0),
        ];
        for v in variants {
            assert_ne!(k, key("m1", &v, &conv()), "{:?}", v);
        }
    }

    #[test]
    fn model_and_turns_contribute() {
        let p = RequestParameters::new("m1");
        let k = key("m1", &p, &conv());
        assert_ne!(k, key("m1-resolved", &p, &conv()));

        let mut reordered = conv();
        reordered.reverse();
        assert_ne!(k, key("m1", &p, &reordered));

        let mut edited = conv();
        edited[1].content.push('!');
        assert_ne!(k, key("m1", &p, &edited));

        let mut shorter = conv();
        shorter.pop();
        assert_ne!(k, key("m1", &p, &shorter));
    }

    #[test]
    fn stop_sequence_order_matters() {
        let p1 = RequestParameters::new("m1").with_stop(vec!["a".into(), "b".into()]);
        let p2 = RequestParameters::new("m1").with_stop(vec!["b".into(), "a".into()]);
        assert_ne!(key("m1", &p1, &conv()), key("m1", &p2, &conv()));
    }
}
