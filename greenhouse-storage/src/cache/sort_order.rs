//! Memoized custom sort order for the plant list.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use greenhouse_core::{GreenhouseResult, OrderList, RepositoryConfig};

use super::single_flight::{CacheStateKind, SingleFlight};
use super::stats::FlightStats;
use crate::traits::PlantService;

/// Single-flight cache for the remotely fetched [`OrderList`].
///
/// The first request fetches the order from the remote service; every later
/// request, concurrent or not, gets that same list. A failed fetch resolves
/// the cache to the configured fallback order for the rest of its life.
#[derive(Debug)]
pub struct SortOrderCache {
    flight: SingleFlight<OrderList>,
    wait_timeout: Option<Duration>,
}

impl SortOrderCache {
    /// Build a cache around an arbitrary fetch operation.
    pub fn new<F, Fut, B>(fetch: F, fallback: B) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GreenhouseResult<OrderList>> + Send + 'static,
        B: Fn() -> OrderList + Send + Sync + 'static,
    {
        Self {
            flight: SingleFlight::new("plant_sort_order", fetch, fallback),
            wait_timeout: None,
        }
    }

    /// Build a cache that fetches from `service` and falls back to the
    /// configured order.
    pub fn for_service<R>(service: Arc<R>, config: &RepositoryConfig) -> Self
    where
        R: PlantService + ?Sized + 'static,
    {
        let fallback = config.fallback_sort_order.clone();
        let cache = Self::new(
            move || {
                let service = Arc::clone(&service);
                async move { service.custom_sort_order().await }
            },
            move || fallback.clone(),
        );
        match config.sort_wait_timeout {
            Some(timeout) => cache.with_wait_timeout(timeout),
            None => cache,
        }
    }

    /// Limit how long a single caller waits before using the fallback.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    /// Get the order list, fetching it on first use.
    pub async fn get_or_await(&self) -> OrderList {
        match self.wait_timeout {
            Some(limit) => self.flight.get_or_await_within(limit).await,
            None => self.flight.get_or_await().await,
        }
    }

    /// Wait for the fetch to finish, ignoring the per-caller wait limit.
    pub async fn resolved(&self) -> OrderList {
        self.flight.get_or_await().await
    }

    /// The resolved order, if the fetch has completed.
    pub fn peek(&self) -> Option<OrderList> {
        self.flight.peek()
    }

    pub fn state(&self) -> CacheStateKind {
        self.flight.state()
    }

    pub fn stats(&self) -> FlightStats {
        self.flight.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenhouse_core::{GreenhouseError, RemoteError};

    #[tokio::test]
    async fn test_returns_fetched_order() {
        let cache = SortOrderCache::new(
            || async { Ok(OrderList::from(vec!["b", "a"])) },
            OrderList::empty,
        );
        let order = cache.get_or_await().await;
        assert_eq!(order, OrderList::from(vec!["b", "a"]));
        assert!(cache.peek().unwrap().ptr_eq(&order));
    }

    #[tokio::test]
    async fn test_failed_fetch_uses_fallback() {
        let cache = SortOrderCache::new(
            || async {
                Err(GreenhouseError::from(RemoteError::Unavailable {
                    endpoint: "custom_plant_sort_order".to_string(),
                    reason: "offline".to_string(),
                }))
            },
            || OrderList::from(vec!["fallback"]),
        );
        assert_eq!(cache.get_or_await().await, OrderList::from(vec!["fallback"]));
        assert_eq!(cache.state(), CacheStateKind::Resolved);
    }

    #[test]
    fn test_wait_timeout_without_runtime_returns_fetched_order() {
        let cache = SortOrderCache::new(
            || async { Ok(OrderList::from(vec!["b", "a"])) },
            OrderList::empty,
        )
        .with_wait_timeout(Duration::from_millis(50));

        let order = futures_util::FutureExt::now_or_never(cache.get_or_await());
        assert_eq!(order, Some(OrderList::from(vec!["b", "a"])));
    }

    #[test]
    fn test_for_service_applies_configured_timeout() {
        struct NoService;

        #[async_trait::async_trait]
        impl PlantService for NoService {
            async fn all_plants(&self) -> GreenhouseResult<Vec<greenhouse_core::Plant>> {
                Ok(Vec::new())
            }
            async fn plants_by_zone(
                &self,
                _zone: greenhouse_core::GrowZone,
            ) -> GreenhouseResult<Vec<greenhouse_core::Plant>> {
                Ok(Vec::new())
            }
            async fn custom_sort_order(&self) -> GreenhouseResult<OrderList> {
                Ok(OrderList::empty())
            }
        }

        let config = RepositoryConfig::new().with_sort_wait_timeout(Duration::from_millis(5));
        let cache = SortOrderCache::for_service(Arc::new(NoService), &config);
        assert_eq!(cache.wait_timeout(), Some(Duration::from_millis(5)));
        assert_eq!(cache.state(), CacheStateKind::Empty);
    }
}
