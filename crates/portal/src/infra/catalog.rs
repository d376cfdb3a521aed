//! Cached reader for the competition catalog
//!
//! One fetch attempt per call, a 5 minute freshness window (configurable),
//! and stale-cache fallback when the backend is down. The cache is owned
//! here and injected nowhere else, so tests construct their own.

use std::sync::Arc;
use std::time::Duration;

use log::warn;
use portal_core::Competition;

use crate::infra::{ApiError, EventBackend, FreshCache};

pub struct CompetitionCatalog {
    backend: Arc<dyn EventBackend>,
    cache: FreshCache<Vec<Competition>>,
}

impl CompetitionCatalog {
    pub fn new(backend: Arc<dyn EventBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            cache: FreshCache::new(ttl),
        }
    }

    /// The competition list, served from cache while fresh. On a failed
    /// refetch the last known list is served regardless of staleness; with
    /// no fallback the failure propagates.
    pub async fn competitions(&self) -> Result<Vec<Competition>, ApiError> {
        if let Some(cached) = self.cache.fresh().await {
            return Ok(cached);
        }

        match self.backend.fetch_competitions().await {
            Ok(list) => {
                self.cache.store(list.clone()).await;
                Ok(list)
            }
            Err(err) => {
                if let Some(stale) = self.cache.any().await {
                    warn!("catalog fetch failed, serving stale cache: {err}");
                    return Ok(stale);
                }
                Err(err)
            }
        }
    }

    /// Looks a competition up by display name.
    pub async fn find(&self, name: &str) -> Result<Option<Competition>, ApiError> {
        let competitions = self.competitions().await?;
        Ok(competitions.into_iter().find(|c| c.name == name))
    }

    /// Clears the cache unconditionally; the next call refetches.
    pub async fn invalidate(&self) {
        self.cache.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{
        ProgressObserver, RegistrationRecord, SubmitAck, SubmitError, SubmitRequest,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeBackend {
        fetches: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl EventBackend for FakeBackend {
        async fn fetch_competitions(&self) -> Result<Vec<Competition>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Request("backend down".into()));
            }
            Ok(vec![Competition::named("Band", 150_000)])
        }

        async fn fetch_registrations(&self) -> Result<Vec<RegistrationRecord>, ApiError> {
            unimplemented!("not used by catalog tests")
        }

        async fn submit_registration(
            &self,
            _request: SubmitRequest,
            _progress: Option<ProgressObserver>,
        ) -> Result<SubmitAck, SubmitError> {
            unimplemented!("not used by catalog tests")
        }
    }

    #[tokio::test]
    async fn test_fresh_window_serves_single_fetch() {
        let backend = Arc::new(FakeBackend::new());
        let catalog = CompetitionCatalog::new(backend.clone(), Duration::from_secs(300));

        catalog.competitions().await.unwrap();
        catalog.competitions().await.unwrap();

        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_elapsed_window_refetches() {
        let backend = Arc::new(FakeBackend::new());
        // Zero TTL: every call is past the freshness window
        let catalog = CompetitionCatalog::new(backend.clone(), Duration::ZERO);

        catalog.competitions().await.unwrap();
        catalog.competitions().await.unwrap();

        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let backend = Arc::new(FakeBackend::new());
        let catalog = CompetitionCatalog::new(backend.clone(), Duration::from_secs(300));

        catalog.competitions().await.unwrap();
        catalog.invalidate().await;
        catalog.competitions().await.unwrap();

        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_stale_cache_served_when_backend_fails() {
        let backend = Arc::new(FakeBackend::new());
        let catalog = CompetitionCatalog::new(backend.clone(), Duration::ZERO);

        let first = catalog.competitions().await.unwrap();
        backend.fail.store(true, Ordering::SeqCst);
        let second = catalog.competitions().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failure_without_cache_propagates() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail.store(true, Ordering::SeqCst);
        let catalog = CompetitionCatalog::new(backend.clone(), Duration::from_secs(300));

        assert!(catalog.competitions().await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let backend = Arc::new(FakeBackend::new());
        let catalog = CompetitionCatalog::new(backend, Duration::from_secs(300));

        assert!(catalog.find("Band").await.unwrap().is_some());
        assert!(catalog.find("Chess").await.unwrap().is_none());
    }
}
