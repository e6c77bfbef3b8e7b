//! Gateway configuration.
//!
//! Values are layered in three steps, each overriding the previous one:
//!
//! 1. YAML file ([`GatewayConfig::from_yaml_file`]) or built-in defaults.
//! 2. Environment variables ([`GatewayConfig::apply_env`]).
//! 3. Explicit forcing calls ([`GatewayConfig::force`]).
//!
//! ```yaml
//! provider: local
//! retry:
//!   max_attempts: 3
//!   waiting_time_secs: 1.0
//!   backoff_factor: 2.0
//! cache:
//!   enabled: true
//!   path: .cache/llm_api_cache.json
//! ollama:
//!   model: llama3.1
//!   response_shape: cognitive_envelope
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::providers::{ApiKey, ResponseShape, PRIMARY};
use crate::types::params::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE,
};
use crate::types::RequestParameters;
use crate::{Error, ErrorContext, Result};

pub const DEFAULT_CACHE_FILE: &str = "llm_api_cache.json";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Environment variable → forcing key.
const ENV_BINDINGS: &[(&str, &str)] = &[
    ("LLM_GATEWAY_PROVIDER", "provider"),
    ("OPENAI_API_KEY", "openai.api_key"),
    ("OPENAI_BASE_URL", "openai.base_url"),
    ("AZURE_OPENAI_ENDPOINT", "azure.endpoint"),
    ("AZURE_OPENAI_KEY", "azure.api_key"),
    ("AZURE_API_VERSION", "azure.api_version"),
    ("OLLAMA_BASE_URL", "ollama.base_url"),
    ("OLLAMA_MODEL", "ollama.model"),
    ("LLM_GATEWAY_CACHE", "cache.enabled"),
    ("LLM_GATEWAY_CACHE_FILE", "cache.path"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Identifier of the active provider.
    pub provider: String,
    pub generation: GenerationSettings,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub openai: OpenAiSettings,
    pub azure: AzureSettings,
    pub ollama: OllamaSettings,
    pub embedding_model: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: PRIMARY.to_string(),
            generation: GenerationSettings::default(),
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            openai: OpenAiSettings::default(),
            azure: AzureSettings::default(),
            ollama: OllamaSettings::default(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub n: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: 0.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            n: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub waiting_time_secs: f64,
    pub backoff_factor: f64,
    pub timeout_secs: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            waiting_time_secs: 0.5,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            timeout_secs: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: Option<ApiKey>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<ApiKey>,
    pub api_version: String,
    /// Deployment used for embeddings; falls back to `embedding_model`.
    pub embedding_deployment: Option<String>,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: "2023-05-15".to_string(),
            embedding_deployment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub endpoint: String,
    /// When set, replaces whatever model the caller asked for.
    pub model: Option<String>,
    pub response_shape: ResponseShape,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            endpoint: "api/chat".to_string(),
            model: None,
            response_shape: ResponseShape::Text,
        }
    }
}

impl GatewayConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: GatewayConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_file"),
            )
        })?;
        debug!(path = %path.display(), "Loaded gateway config");
        Self::from_yaml_str(&content)
    }

    /// Applies the process environment on top of the current values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| env::var(name).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an explicit lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in ENV_BINDINGS {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                self.force(key, &value).map_err(|e| match e {
                    Error::Configuration { message, context } => Error::Configuration {
                        message,
                        context: context.with_source(format!("env:{}", var)),
                    },
                    other => other,
                })?;
            }
        }
        Ok(())
    }

    /// Overrides one setting by dotted key, e.g. `cache.enabled` or
    /// `retry.max_attempts`. Takes precedence over file and environment.
    pub fn force(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "provider" => self.provider = value.trim().to_string(),
            "embedding_model" => self.embedding_model = value.to_string(),

            "generation.model" => self.generation.model = value.to_string(),
            "generation.max_tokens" => self.generation.max_tokens = parse(key, value)?,
            "generation.temperature" => self.generation.temperature = parse(key, value)?,
            "generation.top_p" => self.generation.top_p = parse(key, value)?,
            "generation.frequency_penalty" => {
                self.generation.frequency_penalty = parse(key, value)?
            }
            "generation.presence_penalty" => self.generation.presence_penalty = parse(key, value)?,
            "generation.n" => self.generation.n = parse(key, value)?,

            "retry.max_attempts" => self.retry.max_attempts = parse(key, value)?,
            "retry.waiting_time_secs" => self.retry.waiting_time_secs = parse(key, value)?,
            "retry.backoff_factor" => self.retry.backoff_factor = parse(key, value)?,
            "retry.timeout_secs" => self.retry.timeout_secs = parse(key, value)?,

            "cache.enabled" => self.cache.enabled = parse_bool(key, value)?,
            "cache.path" => self.cache.path = PathBuf::from(value),

            "openai.base_url" => self.openai.base_url = value.to_string(),
            "openai.api_key" => self.openai.api_key = Some(ApiKey::new(value)),

            "azure.endpoint" => self.azure.endpoint = Some(value.to_string()),
            "azure.api_key" => self.azure.api_key = Some(ApiKey::new(value)),
            "azure.api_version" => self.azure.api_version = value.to_string(),
            "azure.embedding_deployment" => {
                self.azure.embedding_deployment = Some(value.to_string())
            }

            "ollama.base_url" => self.ollama.base_url = value.to_string(),
            "ollama.endpoint" => self.ollama.endpoint = value.to_string(),
            "ollama.model" => self.ollama.model = Some(value.to_string()),
            "ollama.response_shape" => self.ollama.response_shape = parse(key, value)?,

            _ => {
                return Err(Error::configuration_with_context(
                    format!("unknown configuration key '{}'", key),
                    ErrorContext::new().with_field_path(key),
                ))
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let valid_id = !self.provider.is_empty()
            && self
                .provider
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_id {
            return Err(invalid(
                "provider",
                format!("'{}' is not a valid provider identifier", self.provider),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        let r = &self.retry;
        if !r.waiting_time_secs.is_finite() || r.waiting_time_secs < 0.0 {
            return Err(invalid("retry.waiting_time_secs", "must be a non-negative number"));
        }
        if !r.backoff_factor.is_finite() || r.backoff_factor <= 0.0 {
            return Err(invalid("retry.backoff_factor", "must be a positive number"));
        }
        if !r.timeout_secs.is_finite() || r.timeout_secs <= 0.0 {
            return Err(invalid("retry.timeout_secs", "must be a positive number"));
        }

        check_url("openai.base_url", &self.openai.base_url)?;
        if let Some(endpoint) = &self.azure.endpoint {
            check_url("azure.endpoint", endpoint)?;
        }
        check_url("ollama.base_url", &self.ollama.base_url)?;
        Ok(())
    }

    /// Request parameters built from the `generation` and `retry` sections.
    pub fn request_defaults(&self) -> Result<RequestParameters> {
        let g = &self.generation;
        let params = RequestParameters::new(g.model.clone())
            .with_max_tokens(g.max_tokens)
            .with_temperature(g.temperature)
            .with_top_p(g.top_p)
            .with_penalties(g.frequency_penalty, g.presence_penalty)
            .with_samples(g.n)
            .with_max_attempts(self.retry.max_attempts)
            .with_timeout(secs("retry.timeout_secs", self.retry.timeout_secs)?)
            .with_backoff(
                secs("retry.waiting_time_secs", self.retry.waiting_time_secs)?,
                self.retry.backoff_factor,
            );
        params.validate()?;
        Ok(params)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        Error::configuration_with_context(
            format!("cannot parse '{}': {}", value, e),
            ErrorContext::new().with_field_path(key),
        )
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration_with_context(
            format!("'{}' is not a boolean", value),
            ErrorContext::new().with_field_path(key),
        )),
    }
}

fn secs(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| invalid(key, format!("invalid duration {}: {}", value, e)))
}

fn check_url(key: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| invalid(key, format!("'{}' is not a valid URL: {}", value, e)))
}

fn invalid(key: &str, msg: impl Into<String>) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new().with_field_path(key).with_source("config"),
    )
}
