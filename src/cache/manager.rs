//! Cache front used by the dispatcher.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::backend::{CacheBackend, FileCache, MemoryCache};
use super::key::CacheKey;
use super::CacheError;
use crate::types::NormalizedResponse;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Response cache with hit/miss accounting over a pluggable backend.
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    path: Option<PathBuf>,
    stats: AtomicStats,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            path: None,
            stats: AtomicStats::default(),
        }
    }

    /// Durable cache persisted at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            path: Some(path.clone()),
            ..Self::new(Arc::new(FileCache::new(path)))
        }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<NormalizedResponse>, CacheError> {
        match self.backend.get(key).await {
            Ok(Some(hit)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(hit))
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub async fn put(&self, key: &CacheKey, response: &NormalizedResponse) -> Result<(), CacheError> {
        match self.backend.put(key, response).await {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub async fn len(&self) -> Result<usize, CacheError> {
        self.backend.len().await
    }

    pub async fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len().await? == 0)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Backing file, for file caches.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = ResponseCache::memory();
        let key = CacheKey::new("k");
        assert!(cache.get(&key).await.unwrap().is_none());
        cache.put(&key, &NormalizedResponse::text("m", "v")).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());
        let stats = cache.stats();
        assert_eq!(stats, CacheStats { hits: 1, misses: 1, writes: 1, errors: 0 });
        assert_eq!(stats.hit_ratio(), 0.5);
        assert_eq!(cache.backend_name(), "memory");
    }
}
