//! In-memory store of the last successful canonical result per query signature.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::CanonicalPayload;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CanonicalPayload,
    stored_at: Instant,
}

/// TTL cache with fresh-only and stale-allowed reads.
///
/// Entries are only ever overwritten. An entry older than the TTL is invisible
/// to [`get_fresh`](Self::get_fresh) but still served by
/// [`get_stale`](Self::get_stale). Clones share the same storage.
#[derive(Debug, Clone)]
pub struct CacheStore {
    entries: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_TTL)
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the payload only while `now - stored_at < ttl`.
    pub fn get_fresh(&self, key: &str) -> Option<CanonicalPayload> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Returns the payload regardless of age.
    pub fn get_stale(&self, key: &str) -> Option<CanonicalPayload> {
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    pub fn set(&self, key: impl Into<String>, payload: CanonicalPayload) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    /// Time since the entry was written.
    pub fn age(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).map(|entry| entry.stored_at.elapsed())
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CanonicalCoin, TrendingList};

    fn coins(price: f64) -> CanonicalPayload {
        CanonicalPayload::Coins(vec![CanonicalCoin::new("bitcoin", "btc", "Bitcoin", price)])
    }

    #[test]
    fn set_overwrites_previous_entry() {
        let cache = CacheStore::new(Duration::from_secs(60));
        assert!(cache.get_fresh("coins_page1_perPage50").is_none());

        cache.set("coins_page1_perPage50", coins(1.0));
        cache.set("coins_page1_perPage50", coins(2.0));

        assert_eq!(cache.get_fresh("coins_page1_perPage50"), Some(coins(2.0)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_only_visible_to_stale_reads() {
        let cache = CacheStore::new(Duration::from_millis(50));
        cache.set("trending", CanonicalPayload::Trending(TrendingList { coins: Vec::new() }));
        assert!(cache.get_fresh("trending").is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(cache.get_fresh("trending").is_none());
        assert!(cache.get_stale("trending").is_some());
        assert!(cache.age("trending").expect("present") >= Duration::from_millis(50));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_ttl_never_serves_fresh() {
        let cache = CacheStore::new(Duration::ZERO);
        cache.set("global_market", coins(1.0));

        assert!(cache.get_fresh("global_market").is_none());
        assert_eq!(cache.get_stale("global_market"), Some(coins(1.0)));
    }

    #[test]
    fn clones_share_entries() {
        let cache = CacheStore::default();
        let clone = cache.clone();
        clone.set("coins_page2_perPage10", coins(3.0));

        assert_eq!(cache.get_fresh("coins_page2_perPage10"), Some(coins(3.0)));
        assert_eq!(cache.ttl(), DEFAULT_TTL);
    }
}
