//! Query-side embedding cache.
//!
//! A bounded LRU of `(text, model) → vector` so repeated recalls do not
//! re-embed the same query. Hit/miss counters are observable. The cache
//! persists opportunistically to `embeddings/cache.json` under a process
//! mutex with atomic replace; persistence failures are logged, never
//! propagated.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::warn;

use engram_core::error::{EngramError, Result};
use engram_core::home::HomeLayout;
use engram_ledger::fsio;

pub const DEFAULT_CAPACITY: usize = 512;

/// Observable cache counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    text: String,
    model: String,
    vector: Vec<f32>,
}

pub struct EmbedCache {
    entries: Mutex<LruCache<(String, String), Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    path: PathBuf,
}

impl EmbedCache {
    /// Create a cache bounded by `capacity` entries, warm-loading any
    /// persisted state. A damaged cache file is discarded, not fatal.
    pub fn new(home: &HomeLayout, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        let mut entries = LruCache::new(capacity);
        let path = home.embedding_cache_path();
        if path.exists() {
            match fsio::read_json::<Vec<PersistedEntry>>(&path) {
                Ok(persisted) => {
                    // Stored most-recent first; insert oldest first to
                    // rebuild the same eviction order.
                    for entry in persisted.into_iter().rev() {
                        entries.put((entry.text, entry.model), entry.vector);
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "discarding damaged embed cache"),
            }
        }
        Self {
            entries: Mutex::new(entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            path,
        }
    }

    pub fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(&(text.to_string(), model.to_string())) {
            Some(vector) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(vector.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, text: &str, model: &str, vector: Vec<f32>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put((text.to_string(), model.to_string()), vector);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Write the cache to disk with atomic replace.
    pub fn persist(&self) -> Result<()> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| EngramError::internal(format!("cache lock poisoned: {e}")))?;
        let persisted: Vec<PersistedEntry> = entries
            .iter()
            .map(|((text, model), vector)| PersistedEntry {
                text: text.clone(),
                model: model.clone(),
                vector: vector.clone(),
            })
            .collect();
        drop(entries);

        if let Some(parent) = self.path.parent() {
            fsio::create_dir_private(parent)?;
        }
        fsio::write_json_atomic(&self.path, &persisted, fsio::MODE_FILE)
    }
}
