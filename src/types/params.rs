//! Generation and retry parameters for one call.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Error, ErrorContext, Result};

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_WAITING_TIME: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 5.0;

/// Everything that shapes a single dispatch.
///
/// The whole struct takes part in the cache key, so two calls that differ in
/// any field (retry knobs included) never share a cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParameters {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    #[serde(default)]
    pub stop: Vec<String>,
    /// Number of samples to request (`n`).
    pub n: u32,
    pub timeout: Duration,
    pub max_attempts: u32,
    /// Initial wait, applied before the first attempt and grown after each failure.
    pub waiting_time: Duration,
    pub backoff_factor: f64,
}

impl Default for RequestParameters {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: 0.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: Vec::new(),
            n: 1,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            waiting_time: DEFAULT_WAITING_TIME,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RequestParameters {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_penalties(mut self, frequency: f64, presence: f64) -> Self {
        self.frequency_penalty = frequency;
        self.presence_penalty = presence;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_samples(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, waiting_time: Duration, factor: f64) -> Self {
        self.waiting_time = waiting_time;
        self.backoff_factor = factor;
        self
    }

    /// Rejects settings under which the dispatch loop cannot run sensibly.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(invalid("model", "model identifier must not be empty"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "max_attempts must be at least 1"));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor <= 0.0 {
            return Err(invalid(
                "backoff_factor",
                format!("backoff_factor must be a positive number, got {}", self.backoff_factor),
            ));
        }
        for (field, value) in [
            ("temperature", self.temperature),
            ("top_p", self.top_p),
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, format!("{} must be finite", field)));
            }
        }
        if self.n == 0 {
            return Err(invalid("n", "sample count must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout", "timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, msg: impl Into<String>) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(format!("parameters.{}", field))
            .with_source("request_parameters"),
    )
}
