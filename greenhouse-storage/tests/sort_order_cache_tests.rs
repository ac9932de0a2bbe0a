//! Sort-Order Cache Tests
//!
//! Exercises the repository's memoized sort order against a scripted
//! remote service: one fetch no matter how many callers, permanent
//! fallback on failure, stable results, and waiters that time out or are
//! cancelled without disturbing the fetch.

use std::sync::Arc;
use std::time::Duration;

use greenhouse_storage::CacheStateKind;
use greenhouse_test_utils::{
    garden_catalogue, garden_sort_order, names, InMemoryPlantStore, MockPlantService, OrderList,
    PlantRepository, RepositoryConfig,
};

type Repo = PlantRepository<InMemoryPlantStore, MockPlantService>;

fn repository(service: MockPlantService, config: RepositoryConfig) -> (Repo, Arc<MockPlantService>) {
    let store = Arc::new(InMemoryPlantStore::with_plants(garden_catalogue()));
    let service = Arc::new(service);
    let repo = PlantRepository::new(store, Arc::clone(&service), config);
    (repo, service)
}

async fn wait_for_fetch_start(service: &MockPlantService) {
    while service.sort_order_calls() == 0 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// SINGLE FLIGHT
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_fetch() {
    let (repo, service) = repository(
        MockPlantService::new(garden_catalogue(), garden_sort_order()).gated(),
        RepositoryConfig::default(),
    );

    let callers: Vec<_> = (0..32)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.sort_order().await })
        })
        .collect();

    wait_for_fetch_start(&service).await;
    service.release_sort_order();

    let mut orders = Vec::new();
    for caller in callers {
        orders.push(caller.await.unwrap());
    }

    assert_eq!(service.sort_order_calls(), 1);
    let first = &orders[0];
    assert_eq!(*first, garden_sort_order());
    assert!(orders.iter().all(|order| order.ptr_eq(first)));
    assert_eq!(repo.sort_order_cache().stats().fetches, 1);
}

#[tokio::test]
async fn test_sorted_reads_after_resolution_skip_the_service() {
    let (repo, service) = repository(
        MockPlantService::new(garden_catalogue(), garden_sort_order()),
        RepositoryConfig::default(),
    );

    let first = repo.sorted_plants().await;
    let second = repo.sorted_plants().await;
    let zone = repo.sorted_plants_in_zone(greenhouse_test_utils::GrowZone(9)).await;

    assert_eq!(first, second);
    assert_eq!(names(&first)[..3], ["Avocado", "Tomato", "Beet"]);
    assert_eq!(names(&zone), vec!["Avocado", "Tomato"]);
    assert_eq!(service.sort_order_calls(), 1);
    assert_eq!(repo.sort_order_cache().stats().hits, 2);
}

// ============================================================================
// FALLBACK
// ============================================================================

#[tokio::test]
async fn test_failed_fetch_falls_back_for_good() {
    let service = MockPlantService::new(garden_catalogue(), garden_sort_order());
    service.fail_sort_order(true);
    let (repo, service) = repository(service, RepositoryConfig::default());

    assert_eq!(repo.sort_order().await, OrderList::empty());
    let sorted = repo.sorted_plants().await;
    assert_eq!(
        names(&sorted),
        vec!["Apple", "Avocado", "Beet", "Cilantro", "Mango", "Tomato"]
    );

    // A later recovery of the service is not observed.
    service.fail_sort_order(false);
    assert_eq!(repo.sort_order().await, OrderList::empty());
    assert_eq!(service.sort_order_calls(), 1);
    assert_eq!(repo.sort_order_cache().stats().fallbacks, 1);
}

#[tokio::test]
async fn test_configured_fallback_order_is_used() {
    let service = MockPlantService::new(garden_catalogue(), garden_sort_order());
    service.fail_sort_order(true);
    let config = RepositoryConfig::new()
        .with_fallback_sort_order(OrderList::from(vec!["mangifera-indica"]));
    let (repo, _service) = repository(service, config);

    let sorted = repo.sorted_plants().await;
    assert_eq!(sorted[0].name, "Mango");
}

// ============================================================================
// CANCELLATION AND TIMEOUTS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_waiter_does_not_cancel_fetch() {
    let (repo, service) = repository(
        MockPlantService::new(garden_catalogue(), garden_sort_order()).gated(),
        RepositoryConfig::default(),
    );

    let waiter = {
        let repo = repo.clone();
        tokio::spawn(async move { repo.sort_order().await })
    };
    wait_for_fetch_start(&service).await;
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());
    assert_eq!(repo.sort_order_cache().state(), CacheStateKind::Pending);

    service.release_sort_order();
    assert_eq!(repo.sort_order().await, garden_sort_order());
    assert_eq!(service.sort_order_calls(), 1);
    assert_eq!(repo.sort_order_cache().state(), CacheStateKind::Resolved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_timeout_uses_fallback_for_that_call_only() {
    let config = RepositoryConfig::new().with_sort_wait_timeout(Duration::from_millis(20));
    let (repo, service) = repository(
        MockPlantService::new(garden_catalogue(), garden_sort_order()).gated(),
        config,
    );

    let early = repo.sorted_plants().await;
    assert_eq!(early[0].name, "Apple");
    assert_eq!(repo.sort_order_cache().stats().timeouts, 1);
    assert_eq!(repo.sort_order_cache().state(), CacheStateKind::Pending);

    service.release_sort_order();
    while repo.sort_order_cache().peek().is_none() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let late = repo.sorted_plants().await;
    assert_eq!(late[0].name, "Avocado");
    assert_eq!(service.sort_order_calls(), 1);
}
