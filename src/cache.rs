//! Process-wide render cache for `cache` and `static` elements.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use papaya::HashMap;

/// A cached fragment of HTML.
#[derive(Debug, Clone)]
struct CacheEntry {
    html: Arc<str>,
    expires_at: Option<Instant>,
}

/// Thread-safe map from cache keys to rendered HTML.
///
/// Uses papaya's lock-free HashMap internally. Expired entries are dropped
/// when they are read; there is no other eviction.
pub struct RenderCache {
    entries: HashMap<String, CacheEntry, ahash::RandomState>,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// The process-wide cache.
    pub fn global() -> &'static RenderCache {
        static GLOBAL: OnceLock<RenderCache> = OnceLock::new();
        GLOBAL.get_or_init(RenderCache::new)
    }

    /// Get cached HTML if present and not expired.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Arc<str>> {
        let pinned = self.entries.pin();
        let entry = pinned.get(key)?;
        match entry.expires_at {
            Some(expires_at) if expires_at <= now => {
                pinned.remove(key);
                None
            }
            _ => Some(entry.html.clone()),
        }
    }

    /// Insert HTML, expiring after `ttl` if given.
    pub fn insert(&self, key: impl Into<String>, html: impl Into<Arc<str>>, ttl: Option<Duration>) {
        let entry = CacheEntry {
            html: html.into(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.pin().insert(key.into(), entry);
    }

    /// Remove an entry.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.pin().remove(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.pin().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache = RenderCache::new();
        assert!(cache.get("a").is_none());
        cache.insert("a", "<p>a</p>", None);
        assert_eq!(cache.get("a").as_deref(), Some("<p>a</p>"));
        assert!(cache.remove("a"));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_entries_expire_on_read() {
        let cache = RenderCache::new();
        cache.insert("a", "x", Some(Duration::from_secs(60)));
        assert!(cache.get("a").is_some());
        let later = Instant::now() + Duration::from_secs(61);
        assert!(cache.get_at("a", later).is_none());
        // Expired entries are removed, not just hidden.
        assert!(cache.get("a").is_none());
    }
}
