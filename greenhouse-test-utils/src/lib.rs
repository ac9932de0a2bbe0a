//! Greenhouse Test Utilities
//!
//! Shared test infrastructure for the Greenhouse workspace:
//! - A scriptable mock remote service with call counters and a fetch gate
//! - A store whose writes always fail
//! - Fixtures for common plant lists
//! - Proptest generators

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

// Re-export core types for convenience
pub use greenhouse_core::{
    GreenhouseError, GreenhouseResult, GrowZone, OrderList, Plant, PlantFilter, RemoteError,
    RepositoryConfig, StoreError,
};
pub use greenhouse_storage::{
    InMemoryPlantStore, LiveQuery, PlantRepository, PlantService, PlantStore, RefreshPolicy,
    RefreshTarget,
};

// ============================================================================
// MOCK REMOTE SERVICE
// ============================================================================

/// Mock remote plant service.
///
/// Serves a fixed catalogue and sort order, counts every call, and can be
/// told to fail or to hold the sort-order fetch until released.
#[derive(Debug)]
pub struct MockPlantService {
    catalogue: Mutex<Vec<Plant>>,
    sort_order: Mutex<OrderList>,
    fail_sort_order: AtomicBool,
    fail_plants: AtomicBool,
    sort_order_delay: Mutex<Option<Duration>>,
    plants_delay: Mutex<Option<Duration>>,
    /// When present, each sort-order fetch takes one permit before answering.
    sort_order_gate: Option<Arc<Semaphore>>,
    all_plants_calls: AtomicUsize,
    zone_calls: AtomicUsize,
    sort_order_calls: AtomicUsize,
}

impl MockPlantService {
    pub fn new(catalogue: Vec<Plant>, sort_order: impl Into<OrderList>) -> Self {
        Self {
            catalogue: Mutex::new(catalogue),
            sort_order: Mutex::new(sort_order.into()),
            fail_sort_order: AtomicBool::new(false),
            fail_plants: AtomicBool::new(false),
            sort_order_delay: Mutex::new(None),
            plants_delay: Mutex::new(None),
            sort_order_gate: None,
            all_plants_calls: AtomicUsize::new(0),
            zone_calls: AtomicUsize::new(0),
            sort_order_calls: AtomicUsize::new(0),
        }
    }

    /// Hold every sort-order fetch until [`release_sort_order`](Self::release_sort_order).
    pub fn gated(mut self) -> Self {
        self.sort_order_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one held sort-order fetch complete.
    pub fn release_sort_order(&self) {
        if let Some(gate) = &self.sort_order_gate {
            gate.add_permits(1);
        }
    }

    /// Delay every sort-order fetch.
    pub fn with_sort_order_delay(self, delay: Duration) -> Self {
        *self.sort_order_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    /// Delay every plant fetch.
    pub fn with_plants_delay(self, delay: Duration) -> Self {
        *self.plants_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    pub fn fail_sort_order(&self, fail: bool) {
        self.fail_sort_order.store(fail, Ordering::SeqCst);
    }

    pub fn fail_plants(&self, fail: bool) {
        self.fail_plants.store(fail, Ordering::SeqCst);
    }

    pub fn set_catalogue(&self, catalogue: Vec<Plant>) {
        *self.catalogue.lock().unwrap_or_else(PoisonError::into_inner) = catalogue;
    }

    pub fn set_sort_order(&self, order: impl Into<OrderList>) {
        *self.sort_order.lock().unwrap_or_else(PoisonError::into_inner) = order.into();
    }

    pub fn all_plants_calls(&self) -> usize {
        self.all_plants_calls.load(Ordering::SeqCst)
    }

    pub fn zone_calls(&self) -> usize {
        self.zone_calls.load(Ordering::SeqCst)
    }

    pub fn sort_order_calls(&self) -> usize {
        self.sort_order_calls.load(Ordering::SeqCst)
    }

    /// Calls that fetch plant data (not the sort order).
    pub fn plant_fetches(&self) -> usize {
        self.all_plants_calls() + self.zone_calls()
    }

    fn unavailable(endpoint: &str) -> GreenhouseError {
        RemoteError::Unavailable {
            endpoint: endpoint.to_string(),
            reason: "mock failure".to_string(),
        }
        .into()
    }

    async fn plants_latency(&self) {
        let delay = *self.plants_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn catalogue(&self) -> Vec<Plant> {
        self.catalogue.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl PlantService for MockPlantService {
    async fn all_plants(&self) -> GreenhouseResult<Vec<Plant>> {
        self.all_plants_calls.fetch_add(1, Ordering::SeqCst);
        self.plants_latency().await;
        if self.fail_plants.load(Ordering::SeqCst) {
            return Err(Self::unavailable("plants"));
        }
        Ok(self.catalogue())
    }

    async fn plants_by_zone(&self, zone: GrowZone) -> GreenhouseResult<Vec<Plant>> {
        self.zone_calls.fetch_add(1, Ordering::SeqCst);
        self.plants_latency().await;
        if self.fail_plants.load(Ordering::SeqCst) {
            return Err(Self::unavailable("plants_by_zone"));
        }
        Ok(self
            .catalogue()
            .into_iter()
            .filter(|plant| plant.grow_zone == zone)
            .collect())
    }

    async fn custom_sort_order(&self) -> GreenhouseResult<OrderList> {
        self.sort_order_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.sort_order_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.sort_order_gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| Self::unavailable("custom_plant_sort_order"))?;
            permit.forget();
        }

        if self.fail_sort_order.load(Ordering::SeqCst) {
            return Err(Self::unavailable("custom_plant_sort_order"));
        }
        Ok(self.sort_order.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

// ============================================================================
// FAILING STORE
// ============================================================================

/// Store that reads like an in-memory store but rejects every write.
#[derive(Debug, Default)]
pub struct FailingPlantStore {
    inner: InMemoryPlantStore,
    write_attempts: AtomicUsize,
}

impl FailingPlantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlantStore for FailingPlantStore {
    fn plants(&self) -> LiveQuery {
        self.inner.plants()
    }

    fn plants_in_zone(&self, zone: GrowZone) -> LiveQuery {
        self.inner.plants_in_zone(zone)
    }

    async fn insert_all(&self, _plants: &[Plant]) -> GreenhouseResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::InsertFailed {
            reason: "disk full".to_string(),
        }
        .into())
    }
}

// ============================================================================
// POLICIES
// ============================================================================

/// Refresh policy that refuses every refresh and counts how often it was asked.
#[derive(Debug, Default)]
pub struct NeverRefresh {
    asked: AtomicUsize,
}

impl NeverRefresh {
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshPolicy for NeverRefresh {
    async fn should_refresh(&self, _target: RefreshTarget) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        false
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A plant with just an id and a name.
pub fn plant(id: &str, name: &str) -> Plant {
    Plant::new(id, name)
}

/// A plant in a specific grow zone.
pub fn plant_in_zone(id: &str, name: &str, zone: i32) -> Plant {
    Plant::new(id, name).with_grow_zone(GrowZone(zone))
}

/// Small mixed-zone catalogue used across tests.
pub fn garden_catalogue() -> Vec<Plant> {
    vec![
        plant_in_zone("malus-pumila", "Apple", 3),
        plant_in_zone("beta-vulgaris", "Beet", 2),
        plant_in_zone("coriandrum-sativum", "Cilantro", 2),
        plant_in_zone("solanum-lycopersicum", "Tomato", 9),
        plant_in_zone("persea-americana", "Avocado", 9),
        plant_in_zone("mangifera-indica", "Mango", 11),
    ]
}

/// Sort order matching [`garden_catalogue`]: avocado and tomato first.
pub fn garden_sort_order() -> OrderList {
    OrderList::from(vec!["persea-americana", "solanum-lycopersicum", "beta-vulgaris"])
}

/// Display names of a plant list, in order.
pub fn names(plants: &[Plant]) -> Vec<String> {
    plants.iter().map(|plant| plant.name.clone()).collect()
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Generate a plant id from a small alphabet so ids collide with order lists.
    pub fn arb_plant_id() -> impl Strategy<Value = String> {
        "[a-h]{1,2}"
    }

    pub fn arb_plant() -> impl Strategy<Value = Plant> {
        (arb_plant_id(), "[A-Z][a-z]{0,6}", -1..12i32).prop_map(|(id, name, zone)| {
            Plant::new(id, name).with_grow_zone(GrowZone(zone))
        })
    }

    pub fn arb_plants(max: usize) -> impl Strategy<Value = Vec<Plant>> {
        prop::collection::vec(arb_plant(), 0..max)
    }

    pub fn arb_order_list() -> impl Strategy<Value = OrderList> {
        prop::collection::vec(arb_plant_id(), 0..10).prop_map(OrderList::from)
    }
}
