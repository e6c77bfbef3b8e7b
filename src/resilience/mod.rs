//! 弹性模块：指数退避策略与可替换的等待接口。
//!
//! # Resilience Module
//!
//! Backoff policy for the dispatch retry loop.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`next_wait`] | Stateless step: `current * multiplier` |
//! | [`BackoffState`] | Per-call current wait |
//! | [`Sleeper`] | Seam for every intentional wait (pacing and backoff) |
//! | [`TokioSleeper`] | Default timer-backed sleeper |
//! | [`RecordingSleeper`] | Non-blocking sleeper that records waits |
//!
//! ```rust
//! use llm_gateway::resilience::{BackoffState, next_wait};
//! use std::time::Duration;
//!
//! let mut state = BackoffState::new(Duration::from_secs(1));
//! state.advance(2.0);
//! assert_eq!(state.current(), next_wait(Duration::from_secs(1), 2.0));
//! ```

pub mod backoff;

pub use backoff::{next_wait, BackoffState, RecordingSleeper, Sleeper, TokioSleeper, WaitReason};
