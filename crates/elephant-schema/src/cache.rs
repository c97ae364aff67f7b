//! C4 — SchemaCache.
//!
//! Maps a schema CID to its parsed JSON Schema document, with a
//! single-flight fetch (concurrent `get` calls for the same CID collapse
//! to one underlying fetch), a bounded in-memory LRU, and an optional
//! disk layer. Modeled on `lintel-schema-cache`'s disk-backed cache, with
//! the single-flight guarantee added via a per-CID lock registry.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Error)]
pub enum SchemaCacheError {
    #[error("schema {cid} unavailable: {cause}")]
    SchemaUnavailable { cid: String, cause: String },
    #[error("schema {cid} is not valid JSON: {cause}")]
    Malformed { cid: String, cause: String },
}

/// The underlying content store a cache miss fetches from. Production
/// code talks to the pinning gateway over HTTP; tests substitute an
/// in-memory double.
#[async_trait::async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_raw(&self, schema_cid: &str) -> Result<Vec<u8>, SchemaCacheError>;
}

/// Hit/miss/eviction counters, surfaced in the run summary under
/// `--verbose`. Not required for correctness, purely observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Inner {
    lru: Mutex<lru::LruCache<String, Arc<Value>>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    disk_dir: Option<PathBuf>,
    stats: Mutex<CacheStats>,
}

/// `get(schema_cid)` with single-flight fetch, bounded LRU, and an
/// optional disk layer, generic over the content-store backend.
#[derive(Clone)]
pub struct SchemaCache<S: SchemaSource> {
    source: Arc<S>,
    inner: Arc<Inner>,
}

impl<S: SchemaSource> SchemaCache<S> {
    pub fn new(source: S, capacity: usize, disk_dir: Option<PathBuf>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            source: Arc::new(source),
            inner: Arc::new(Inner {
                lru: Mutex::new(lru::LruCache::new(capacity)),
                locks: Mutex::new(HashMap::new()),
                disk_dir,
                stats: Mutex::new(CacheStats::default()),
            }),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.inner.stats.lock().unwrap()
    }

    fn disk_path(&self, schema_cid: &str) -> Option<PathBuf> {
        self.inner
            .disk_dir
            .as_ref()
            .map(|dir| dir.join(format!("{schema_cid}.json")))
    }

    fn memory_get(&self, schema_cid: &str) -> Option<Arc<Value>> {
        self.inner.lru.lock().unwrap().get(schema_cid).cloned()
    }

    fn memory_put(&self, schema_cid: &str, value: Arc<Value>) {
        let mut lru = self.inner.lru.lock().unwrap();
        let was_full = lru.len() >= lru.cap().get() && !lru.contains(schema_cid);
        lru.put(schema_cid.to_string(), value);
        if was_full {
            self.inner.stats.lock().unwrap().evictions += 1;
        }
    }

    fn lock_for(&self, schema_cid: &str) -> Arc<AsyncMutex<()>> {
        self.inner
            .locks
            .lock()
            .unwrap()
            .entry(schema_cid.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn read_disk(&self, schema_cid: &str) -> Option<Vec<u8>> {
        let path = self.disk_path(schema_cid)?;
        tokio::fs::read(&path).await.ok()
    }

    async fn write_disk(&self, schema_cid: &str, bytes: &[u8]) {
        let Some(path) = self.disk_path(schema_cid) else {
            return;
        };
        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(error = %e, "failed to create schema disk cache directory");
            return;
        }
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            tracing::warn!(error = %e, path = %path.display(), "failed to write schema disk cache entry");
            return;
        }
        let hash_path = path.with_extension("json.sha256");
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = format!("{:x}", hasher.finalize());
        let _ = tokio::fs::write(&hash_path, digest).await;
    }

    /// Resolve a schema by CID. Concurrent callers racing on the same
    /// `schema_cid` share one underlying fetch; a failure is never
    /// cached, so a subsequent call retries from scratch.
    pub async fn get(&self, schema_cid: &str) -> Result<Arc<Value>, SchemaCacheError> {
        if let Some(hit) = self.memory_get(schema_cid) {
            self.inner.stats.lock().unwrap().hits += 1;
            return Ok(hit);
        }

        let lock = self.lock_for(schema_cid);
        let _guard = lock.lock().await;

        // another waiter may have populated the cache while we waited
        if let Some(hit) = self.memory_get(schema_cid) {
            self.inner.stats.lock().unwrap().hits += 1;
            return Ok(hit);
        }

        self.inner.stats.lock().unwrap().misses += 1;

        let bytes = match self.read_disk(schema_cid).await {
            Some(bytes) => bytes,
            None => {
                let bytes = self.source.fetch_raw(schema_cid).await?;
                self.write_disk(schema_cid, &bytes).await;
                bytes
            }
        };

        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| SchemaCacheError::Malformed {
                cid: schema_cid.to_string(),
                cause: e.to_string(),
            })?;
        let value = Arc::new(value);
        self.memory_put(schema_cid, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        body: Vec<u8>,
    }

    #[async_trait::async_trait]
    impl SchemaSource for CountingSource {
        async fn fetch_raw(&self, _schema_cid: &str) -> Result<Vec<u8>, SchemaCacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(self.body.clone())
        }
    }

    fn source(body: &str) -> CountingSource {
        CountingSource {
            calls: AtomicUsize::new(0),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn caches_after_first_fetch() {
        let cache = SchemaCache::new(source(r#"{"type":"object"}"#), 8, None);
        cache.get("cid-a").await.unwrap();
        cache.get("cid-a").await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn single_flight_dedupes_concurrent_fetches() {
        let cache = SchemaCache::new(source(r#"{"type":"object"}"#), 8, None);
        let a = cache.clone();
        let b = cache.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a.get("cid-shared").await }),
            tokio::spawn(async move { b.get("cid-shared").await }),
        );
        r1.unwrap().unwrap();
        r2.unwrap().unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        struct FlakySource {
            calls: AtomicUsize,
        }
        #[async_trait::async_trait]
        impl SchemaSource for FlakySource {
            async fn fetch_raw(&self, cid: &str) -> Result<Vec<u8>, SchemaCacheError> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(SchemaCacheError::SchemaUnavailable {
                        cid: cid.to_string(),
                        cause: "connection refused".into(),
                    })
                } else {
                    Ok(b"{}".to_vec())
                }
            }
        }
        let cache = SchemaCache::new(
            FlakySource {
                calls: AtomicUsize::new(0),
            },
            8,
            None,
        );
        assert!(cache.get("cid-x").await.is_err());
        assert!(cache.get("cid-x").await.is_ok());
    }

    #[tokio::test]
    async fn lru_evicts_least_recently_used() {
        let cache = SchemaCache::new(source("{}"), 1, None);
        cache.get("a").await.unwrap();
        cache.get("b").await.unwrap();
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn disk_layer_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SchemaCache::new(source(r#"{"type":"string"}"#), 8, Some(dir.path().to_path_buf()));
        cache.get("cid-disk").await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);

        // a fresh cache instance pointed at the same disk directory serves
        // from disk without calling the source again
        let cache2 = SchemaCache::new(source(r#"{"type":"string"}"#), 8, Some(dir.path().to_path_buf()));
        cache2.get("cid-disk").await.unwrap();
        assert_eq!(cache2.source.calls.load(Ordering::SeqCst), 0);
    }
}
