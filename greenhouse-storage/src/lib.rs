//! Greenhouse Storage - Plant Repository Core
//!
//! Collaborator traits for the local store and the remote catalogue, the
//! single-flight sort-order cache, the sorting projector, refresh policies,
//! and the [`PlantRepository`] that ties them together.
//!
//! [`InMemoryPlantStore`] is a complete store implementation backed by a
//! map, suitable for tests and for hosts without a database.

pub mod cache;
pub mod feed;
pub mod live;
pub mod projector;
pub mod refresh;
pub mod repository;
pub mod traits;

pub use cache::{CacheStateKind, FlightStats, SingleFlight, SortOrderCache};
pub use feed::SortedFeed;
pub use live::{LiveQuery, PlantSnapshot};
pub use projector::{RankKey, SortingProjector, UNRANKED};
pub use refresh::{policy_from_config, AlwaysRefresh, MinIntervalRefresh, RefreshPolicy, RefreshTarget};
pub use repository::PlantRepository;
pub use traits::{PlantService, PlantStore};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use greenhouse_core::{GreenhouseResult, GrowZone, Plant, PlantFilter, PlantId, StoreError};
use tokio::sync::watch;
use tracing::debug;

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory plant store.
///
/// Plants are upserted by id. Every write publishes a fresh snapshot,
/// ordered by name and then id, to all live queries.
#[derive(Debug)]
pub struct InMemoryPlantStore {
    plants: RwLock<HashMap<PlantId, Plant>>,
    snapshots: watch::Sender<PlantSnapshot>,
}

impl InMemoryPlantStore {
    pub fn new() -> Self {
        let (snapshots, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            plants: RwLock::new(HashMap::new()),
            snapshots,
        }
    }

    /// Create a store pre-populated with `plants`.
    pub fn with_plants(plants: impl IntoIterator<Item = Plant>) -> Self {
        let store = Self::new();
        {
            let mut map = store.plants.write().unwrap_or_else(|p| p.into_inner());
            for plant in plants {
                map.insert(plant.plant_id.clone(), plant);
            }
            store.snapshots.send_replace(Arc::new(ordered(&map)));
        }
        store
    }

    /// Number of stored plants.
    pub fn len(&self) -> usize {
        self.snapshots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a stored plant by id.
    pub fn get(&self, plant_id: &str) -> Option<Plant> {
        self.snapshots
            .borrow()
            .iter()
            .find(|plant| plant.plant_id == plant_id)
            .cloned()
    }

    /// Number of live queries currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.snapshots.receiver_count()
    }

    fn query(&self, filter: PlantFilter) -> LiveQuery {
        LiveQuery::new(self.snapshots.subscribe(), filter)
    }
}

impl Default for InMemoryPlantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlantStore for InMemoryPlantStore {
    fn plants(&self) -> LiveQuery {
        self.query(PlantFilter::All)
    }

    fn plants_in_zone(&self, zone: GrowZone) -> LiveQuery {
        self.query(PlantFilter::Zone(zone))
    }

    async fn insert_all(&self, plants: &[Plant]) -> GreenhouseResult<()> {
        let mut map = self.plants.write().map_err(|_| StoreError::LockPoisoned)?;
        for plant in plants {
            map.insert(plant.plant_id.clone(), plant.clone());
        }
        // Publish under the write lock so snapshots go out in write order.
        self.snapshots.send_replace(Arc::new(ordered(&map)));
        debug!(inserted = plants.len(), total = map.len(), "Plants stored");
        Ok(())
    }
}

fn ordered(map: &HashMap<PlantId, Plant>) -> Vec<Plant> {
    let mut plants: Vec<Plant> = map.values().cloned().collect();
    plants.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.plant_id.cmp(&b.plant_id)));
    plants
}
