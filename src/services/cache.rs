//! In-memory result cache keyed by location.
//!
//! One TTL for every key, checked lazily on read. There is no eviction and no
//! size bound: stale entries stay until overwritten or the process exits.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::WeatherRecord;

/// A cached record and the time its fetch started.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: Arc<WeatherRecord>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Store `record` under `key`.
    ///
    /// `fetched_at` never moves backwards for a key: if the stored entry is
    /// newer than `fetched_at` the write is dropped and `false` is returned.
    pub fn put(&self, key: &str, record: Arc<WeatherRecord>, fetched_at: DateTime<Utc>) -> bool {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(key) {
            if existing.fetched_at > fetched_at {
                tracing::debug!(
                    "Cache: dropping write for '{}' stamped {} (stored entry is {})",
                    key,
                    fetched_at,
                    existing.fetched_at
                );
                return false;
            }
        }
        entries.insert(key.to_string(), CacheEntry { record, fetched_at });
        true
    }

    pub fn invalidate(&self, key: &str) -> Option<CacheEntry> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// `0 <= now - fetched_at < ttl`.
    ///
    /// An entry stamped after `now` (clock skew) is not fresh.
    pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        let elapsed = now - entry.fetched_at;
        if elapsed < Duration::zero() {
            return false;
        }
        match Duration::from_std(ttl) {
            Ok(ttl) => elapsed < ttl,
            // Beyond chrono's range: effectively never expires.
            Err(_) => true,
        }
    }
}
