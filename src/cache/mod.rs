//! 响应缓存模块：按请求指纹持久化响应，避免重复的付费调用。
//!
//! # Response Cache Module
//!
//! Stores normalized responses under a deterministic fingerprint of
//! (model, parameters, conversation) so a repeated request never reaches the
//! network twice.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheKey`] | SHA-256 fingerprint of a request |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`FileCache`] | Durable single-file JSON store, loaded on first use |
//! | [`MemoryCache`] | Process-local store |
//! | [`ResponseCache`] | Front with hit/miss statistics |
//!
//! ## Limitations
//!
//! Entries never expire and there is no eviction: the cache grows with every
//! distinct request. Only successful responses are ever written.
//!
//! ## Example
//!
//! ```rust
//! use llm_gateway::cache::{CacheKey, ResponseCache};
//! use llm_gateway::{Message, NormalizedResponse, RequestParameters};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ResponseCache::memory();
//! let params = RequestParameters::new("m1");
//! let key = CacheKey::compute("m1", &params, &[Message::user("Hello")])?;
//! cache.put(&key, &NormalizedResponse::text("m1", "Hi there")).await?;
//! assert!(cache.get(&key).await?.is_some());
//! # Ok(())
//! # }
//! ```

mod backend;
mod key;
mod manager;

use std::path::PathBuf;
use thiserror::Error;

pub use backend::{CacheBackend, FileCache, MemoryCache, CACHE_FILE_VERSION};
pub use key::CacheKey;
pub use manager::{CacheStats, ResponseCache};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {path:?} is not a valid cache: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache file {path:?} has unsupported version {found}")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("failed to serialize cache entry: {0}")]
    Serialization(#[source] serde_json::Error),
}
