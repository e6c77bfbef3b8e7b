//! Token 估算模块：为诊断日志估算请求的 Token 数量。
//!
//! # Token Estimation Module
//!
//! Estimates the prompt size of a conversation in model-specific units. The
//! dispatcher logs the estimate before every network attempt; it never drives
//! a control decision, and an unsupported model is a loggable, recoverable
//! condition.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`estimate`] | Conversation + model → token count or [`TokenError::Unsupported`] |
//! | [`TokenCounter`] | Trait for text → token count |
//! | [`CharacterEstimator`] | Character-based approximation (4 chars ≈ 1 token) |
//! | [`MessageOverhead`] | Per-message framing cost of a model family |
//!
//! ## Example
//!
//! ```rust
//! use llm_gateway::tokens::{estimate, TokenError};
//! use llm_gateway::Message;
//!
//! let conversation = vec![Message::user("Hello")];
//! assert!(estimate(&conversation, "gpt-4").is_ok());
//! assert!(matches!(estimate(&conversation, "llama3.1"), Err(TokenError::Unsupported(_))));
//! ```

mod counter;

pub use counter::{
    estimate, get_token_counter, message_overhead, CharacterEstimator, MessageOverhead,
    TokenCounter, TokenError,
};
