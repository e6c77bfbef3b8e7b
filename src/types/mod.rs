//! 类型模块：定义会话、请求参数与归一化响应等核心数据类型。
//!
//! # Types Module
//!
//! Canonical shapes shared by every adapter: callers build a [`Conversation`]
//! and [`RequestParameters`], and always get a [`NormalizedResponse`] back,
//! whatever backend served the call.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | One conversation turn (role + text) |
//! | [`MessageRole`] | `system`, `user` or `assistant` |
//! | [`RequestParameters`] | Generation and retry knobs, immutable during a call |
//! | [`NormalizedResponse`] | Provider-agnostic result with the raw payload attached |
//! | [`ResponseContent`] | Explicit `Text` / `Structured` result variant |
//!
//! ## Example
//!
//! ```rust
//! use llm_gateway::types::{Message, RequestParameters};
//!
//! let conversation = vec![
//!     Message::system("You are a survey respondent."),
//!     Message::user("How old are you?"),
//! ];
//! let params = RequestParameters::new("gpt-4").with_max_attempts(3);
//! assert_eq!(conversation.len(), 2);
//! assert!(params.validate().is_ok());
//! ```

pub mod message;
pub mod params;
pub mod response;

pub use message::{Conversation, Message, MessageRole};
pub use params::RequestParameters;
pub use response::{NormalizedResponse, ResponseContent, Usage};
