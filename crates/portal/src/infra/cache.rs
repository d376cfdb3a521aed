//! Freshness-window cache for the read endpoints
//!
//! One slot per endpoint, replaced as a unit on every successful fetch.
//! Readers either take the value while it is still inside the window, or
//! take it regardless of age when the backend is down.

use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CachedValue<T> {
    value: T,
    fetched_at: Instant,
}

pub struct FreshCache<T> {
    ttl: Duration,
    slot: RwLock<Option<CachedValue<T>>>,
}

impl<T: Clone> FreshCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// The cached value, only while it is inside the freshness window.
    pub async fn fresh(&self) -> Option<T> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.value.clone())
    }

    /// The cached value regardless of age. Used as the fallback when a
    /// refetch fails.
    pub async fn any(&self) -> Option<T> {
        let slot = self.slot.read().await;
        slot.as_ref().map(|cached| cached.value.clone())
    }

    /// Replaces value and timestamp as one unit.
    pub async fn store(&self, value: T) {
        let mut slot = self.slot.write().await;
        *slot = Some(CachedValue {
            value,
            fetched_at: Instant::now(),
        });
    }

    pub async fn clear(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_within_window() {
        let cache = FreshCache::new(Duration::from_secs(300));
        cache.store(7u32).await;
        assert_eq!(cache.fresh().await, Some(7));
        assert_eq!(cache.any().await, Some(7));
    }

    #[tokio::test]
    async fn test_expired_value_still_available_as_fallback() {
        let cache = FreshCache::new(Duration::ZERO);
        cache.store(7u32).await;
        assert_eq!(cache.fresh().await, None);
        assert_eq!(cache.any().await, Some(7));
    }

    #[tokio::test]
    async fn test_clear_drops_the_slot() {
        let cache = FreshCache::new(Duration::from_secs(300));
        cache.store(7u32).await;
        cache.clear().await;
        assert_eq!(cache.fresh().await, None);
        assert_eq!(cache.any().await, None);
    }
}
