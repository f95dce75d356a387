//! Style lookup caching.
//!
//! Resolving a style from disk means reading and parsing a JSON file, so
//! catalogs keep the result (including "not found") for a configurable time.
//! The whole cache is dropped when a library is reloaded.
//!
//! - Thread-safe access via `Arc<RwLock<>>`
//! - Time-based expiration with configurable max age
//!
//! ```
//! use refshelf_format::cache::StyleCache;
//!
//! let cache = StyleCache::new();
//! cache.set("apa".to_string(), None);
//! assert!(cache.get("apa").is_some_and(|c| c.style.is_none()));
//! cache.clear();
//! assert!(cache.get("apa").is_none());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::style::StyleHandle;

/// Default maximum cache age in seconds (5 minutes).
pub const DEFAULT_MAX_AGE_SECS: u64 = 300;

/// Configuration for cache behavior.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum age of cache entries. Older entries are not served.
    pub max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
        }
    }
}

impl CacheConfig {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

/// Status of a cached lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Expired,
}

/// A cached lookup result.
#[derive(Debug, Clone)]
pub struct CachedStyle {
    /// The resolved style, or `None` for a cached miss.
    pub style: Option<StyleHandle>,
    pub cached_at: Instant,
}

impl CachedStyle {
    pub fn new(style: Option<StyleHandle>) -> Self {
        Self {
            style,
            cached_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }

    pub fn status(&self, config: &CacheConfig) -> CacheStatus {
        if self.age() < config.max_age {
            CacheStatus::Fresh
        } else {
            CacheStatus::Expired
        }
    }
}

/// Thread-safe style cache keyed by normalized style name.
///
/// Clones share the same entries.
#[derive(Debug, Clone)]
pub struct StyleCache {
    cache: Arc<RwLock<HashMap<String, CachedStyle>>>,
    config: CacheConfig,
}

impl Default for StyleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleCache {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Gets a cached lookup. Expired entries are treated as absent.
    pub fn get(&self, name: &str) -> Option<CachedStyle> {
        let cache = self.cache.read().ok()?;
        let entry = cache.get(name)?;
        if entry.status(&self.config) == CacheStatus::Expired {
            return None;
        }
        Some(entry.clone())
    }

    /// Stores a lookup result.
    pub fn set(&self, name: String, style: Option<StyleHandle>) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(name, CachedStyle::new(style));
        }
    }

    /// Removes one entry. Returns whether it was present.
    pub fn invalidate(&self, name: &str) -> bool {
        if let Ok(mut cache) = self.cache.write() {
            return cache.remove(name).is_some();
        }
        false
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            let dropped = cache.len();
            cache.clear();
            tracing::debug!(dropped, "Style cache cleared");
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all expired entries, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        if let Ok(mut cache) = self.cache.write() {
            let before = cache.len();
            cache.retain(|_, entry| entry.status(&self.config) == CacheStatus::Fresh);
            before - cache.len()
        } else {
            0
        }
    }

    /// Returns statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        let Ok(cache) = self.cache.read() else {
            return CacheStats::default();
        };
        let mut stats = CacheStats {
            total: cache.len(),
            ..CacheStats::default()
        };
        for entry in cache.values() {
            match entry.status(&self.config) {
                CacheStatus::Fresh => stats.fresh += 1,
                CacheStatus::Expired => stats.expired += 1,
            }
            if entry.style.is_none() {
                stats.misses += 1;
            }
        }
        stats
    }
}

/// Statistics about cache state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub expired: usize,
    /// Entries recording that a style does not exist.
    pub misses: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{CitationStyle, InlineLayout};

    fn style(id: &str) -> StyleHandle {
        Arc::new(CitationStyle {
            id: id.to_string(),
            title: id.to_string(),
            names: Default::default(),
            inline: InlineLayout::default(),
            bibliography: None,
        })
    }

    #[test]
    fn test_set_get() {
        let cache = StyleCache::new();
        cache.set("apa".to_string(), Some(style("apa")));

        let cached = cache.get("apa").unwrap();
        assert_eq!(cached.style.unwrap().id, "apa");
        assert!(cache.get("ieee").is_none());
    }

    #[test]
    fn test_cached_miss_is_distinct_from_absent() {
        let cache = StyleCache::new();
        cache.set("nope".to_string(), None);
        assert!(cache.get("nope").unwrap().style.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_zero_max_age_expires_immediately() {
        let cache = StyleCache::with_config(CacheConfig::new(Duration::ZERO));
        cache.set("apa".to_string(), Some(style("apa")));

        assert!(cache.get("apa").is_none());
        assert_eq!(cache.stats().expired, 1);
        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = StyleCache::new();
        cache.set("a".to_string(), Some(style("a")));
        cache.set("b".to_string(), Some(style("b")));

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clone_shares_state() {
        let cache1 = StyleCache::new();
        let cache2 = cache1.clone();
        cache1.set("apa".to_string(), Some(style("apa")));
        assert!(cache2.get("apa").is_some());
    }

    #[test]
    fn test_stats() {
        let cache = StyleCache::new();
        cache.set("a".to_string(), Some(style("a")));
        cache.set("b".to_string(), None);
        assert_eq!(
            cache.stats(),
            CacheStats {
                total: 2,
                fresh: 2,
                expired: 0,
                misses: 1
            }
        );
    }
}
