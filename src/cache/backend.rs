//! Cache backend implementations.

use super::key::CacheKey;
use super::CacheError;
use crate::types::NormalizedResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

/// Version tag written into every cache file.
pub const CACHE_FILE_VERSION: u32 = 1;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<NormalizedResponse>, CacheError>;
    async fn put(&self, key: &CacheKey, response: &NormalizedResponse) -> Result<(), CacheError>;
    async fn len(&self) -> Result<usize, CacheError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    response: NormalizedResponse,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile<M> {
    version: u32,
    entries: M,
}

/// Durable cache backed by a single JSON file.
///
/// - Entries are loaded eagerly, once, on first use.
/// - Every insertion rewrites the file before returning (no batching).
/// - Entries never expire and are never evicted; the file grows with every
///   distinct request.
pub struct FileCache {
    path: PathBuf,
    entries: OnceCell<RwLock<HashMap<String, StoredEntry>>>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn entries(&self) -> Result<&RwLock<HashMap<String, StoredEntry>>, CacheError> {
        self.entries
            .get_or_try_init(|| async { load(&self.path).await.map(RwLock::new) })
            .await
    }
}

async fn load(path: &Path) -> Result<HashMap<String, StoredEntry>, CacheError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No cache file yet, starting empty");
            return Ok(HashMap::new());
        }
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file: CacheFile<HashMap<String, StoredEntry>> =
        serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    if file.version != CACHE_FILE_VERSION {
        return Err(CacheError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: file.version,
        });
    }
    debug!(path = %path.display(), entries = file.entries.len(), "Loaded response cache");
    Ok(file.entries)
}

async fn persist(path: &Path, entries: &HashMap<String, StoredEntry>) -> Result<(), CacheError> {
    // Sorted keys keep the file byte-stable for the same content.
    let sorted: BTreeMap<&String, &StoredEntry> = entries.iter().collect();
    let data = serde_json::to_vec_pretty(&CacheFile {
        version: CACHE_FILE_VERSION,
        entries: sorted,
    })
    .map_err(CacheError::Serialization)?;

    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &data).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<NormalizedResponse>, CacheError> {
        let entries = self.entries().await?.read().await;
        Ok(entries.get(&key.hash).map(|e| e.response.clone()))
    }

    async fn put(&self, key: &CacheKey, response: &NormalizedResponse) -> Result<(), CacheError> {
        // The write guard is held across the file write so concurrent inserts
        // cannot interleave their snapshots.
        let mut entries = self.entries().await?.write().await;
        entries.insert(
            key.hash.clone(),
            StoredEntry {
                model: key.model.clone(),
                response: response.clone(),
            },
        );
        persist(&self.path, &entries).await
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.entries().await?.read().await.len())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Process-local cache; forgets everything on exit.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, NormalizedResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<NormalizedResponse>, CacheError> {
        Ok(self.entries.read().await.get(&key.hash).cloned())
    }

    async fn put(&self, key: &CacheKey, response: &NormalizedResponse) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(key.hash.clone(), response.clone());
        Ok(())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.entries.read().await.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        let key = CacheKey::new("abc");
        assert!(cache.get(&key).await.unwrap().is_none());
        cache
            .put(&key, &NormalizedResponse::text("m1", "Hi"))
            .await
            .unwrap();
        assert_eq!(
            cache.get(&key).await.unwrap().unwrap().text_content(),
            Some("Hi")
        );
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_file_starts_empty_and_is_created_on_put() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let cache = FileCache::new(&path);
        assert_eq!(cache.len().await.unwrap(), 0);
        assert!(!path.exists());

        cache
            .put(&CacheKey::new("k").with_model("m1"), &NormalizedResponse::text("m1", "x"))
            .await
            .unwrap();
        assert!(path.exists());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["entries"]["k"]["model"], "m1");
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = FileCache::new(&path).len().await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, br#"{"version": 99, "entries": {}}"#).unwrap();
        let err = FileCache::new(&path).len().await.unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedVersion { found: 99, .. }));
    }
}
