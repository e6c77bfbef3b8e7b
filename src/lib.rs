//! # llm-gateway
//!
//! 面向多个可互换 LLM 后端的弹性调用网关：统一接口、重试退避与响应缓存。
//!
//! Resilient gateway for text-generation and embedding calls against
//! interchangeable large-language-model backends.
//!
//! ## Overview
//!
//! Callers hand a conversation and a set of [`RequestParameters`] to the
//! [`Dispatcher`] and get a [`NormalizedResponse`] back, whichever backend
//! served the call. Between the two sit the parts that make the call
//! dependable:
//!
//! - **Provider abstraction**: one [`providers::ProviderAdapter`] per backend
//!   wire format, selected through the [`ProviderRegistry`]
//! - **Retry with backoff**: bounded attempts, exponential waits, and a pacing
//!   delay before each network attempt
//! - **Response cache**: a deterministic request fingerprint keyed into a
//!   durable JSON file, so a repeated request is never paid for twice
//! - **Typed failures**: every outcome is a value of [`Error`], classified by
//!   [`FailureKind`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_gateway::config::GatewayConfig;
//! use llm_gateway::{Dispatcher, Message};
//!
//! #[tokio::main]
//! async fn main() -> llm_gateway::Result<()> {
//!     let mut config = GatewayConfig::default();
//!     config.apply_env()?;
//!     config.force("cache.enabled", "true")?;
//!
//!     let dispatcher = Dispatcher::from_config(&config)?;
//!     let params = config.request_defaults()?.with_max_attempts(3);
//!
//!     let reply = dispatcher
//!         .dispatch(&[Message::user("Hello, how are you?")], &params)
//!         .await?;
//!     println!("{}", reply.content.to_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatch`] | Dispatch engine: cache lookup, retry loop, batching |
//! | [`providers`] | Adapters for the hosted, enterprise and local backends |
//! | [`registry`] | Provider identifier → adapter binding |
//! | [`cache`] | Request fingerprints and response cache backends |
//! | [`resilience`] | Backoff policy and the sleeper seam |
//! | [`tokens`] | Diagnostic prompt-size estimates |
//! | [`transport`] | Pooled HTTP client and failure classification |
//! | [`config`] | YAML / environment / forced configuration |
//! | [`types`] | Conversation, parameters, normalized response |

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error_code;
pub mod providers;
pub mod registry;
pub mod resilience;
pub mod tokens;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::GatewayConfig;
pub use dispatch::{BatchRequest, Dispatcher, DispatcherBuilder};
pub use registry::ProviderRegistry;
pub use types::{
    Conversation, Message, MessageRole, NormalizedResponse, RequestParameters, ResponseContent,
    Usage,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, FailureKind};
