//! 调度模块：带缓存、重试与退避的统一请求入口。
//!
//! # Dispatch Module
//!
//! The [`Dispatcher`] is the one entry point callers use. For every call it
//! resolves the adapter, consults the response cache, and otherwise runs a
//! bounded retry loop with exponential backoff until the backend answers or
//! the attempt budget runs out.
//!
//! | Outcome of an attempt | What happens next |
//! |-----------------------|-------------------|
//! | success | written to the cache (if attached) and returned |
//! | invalid request | returned at once, no backoff |
//! | rate limited / transient / unclassified | backoff wait, wait grows, next attempt |
//! | capability / missing credential | returned at once |
//!
//! ## Example
//!
//! ```rust,no_run
//! use llm_gateway::config::GatewayConfig;
//! use llm_gateway::{Dispatcher, Message};
//!
//! # #[tokio::main]
//! # async fn main() -> llm_gateway::Result<()> {
//! let mut config = GatewayConfig::default();
//! config.apply_env()?;
//! let dispatcher = Dispatcher::from_config(&config)?;
//!
//! let params = config.request_defaults()?;
//! let reply = dispatcher
//!     .dispatch(&[Message::user("Hello")], &params)
//!     .await?;
//! println!("{}", reply.content.to_text());
//! # Ok(())
//! # }
//! ```

mod builder;
mod engine;

pub use builder::DispatcherBuilder;
pub use engine::{BatchRequest, Dispatcher};
