//! Translation cache.
//!
//! Keys are the SHA-256 hex digest of `"{text}_{target_lang}"`; values are
//! the translated strings. The store is injected into the translator as a
//! trait object, so a shared external store can replace the in-memory one.

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Key/value store with per-entry expiry.
///
/// Implementations must be safe to share between concurrent requests.
/// Concurrent `set`s for the same key are last-write-wins.
pub trait TranslationCache: Send + Sync {
    /// The live value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration);
}

/// Cache key for a text and target language.
pub fn cache_key(text: &str, target_lang: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"_");
    hasher.update(target_lang.as_bytes());
    hex::encode(hasher.finalize())
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local bounded cache: least-recently-used eviction plus expiry.
///
/// Expired entries are dropped lazily on lookup.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TranslationCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .put(key.to_string(), Entry { value, expires_at });
    }
}
