//! Collaborator traits for the local plant store and the remote catalogue.
//!
//! The repository core never talks to a database or the network directly.
//! It reads through [`PlantStore`] live queries, writes through
//! [`PlantStore::insert_all`], and fetches through [`PlantService`].

use async_trait::async_trait;
use greenhouse_core::{GreenhouseResult, GrowZone, OrderList, Plant};

use crate::live::LiveQuery;

/// Local plant store.
///
/// Implementations own the plant rows and notify live queries whenever the
/// stored set changes.
#[async_trait]
pub trait PlantStore: Send + Sync {
    /// Live query over every stored plant, ordered by name.
    fn plants(&self) -> LiveQuery;

    /// Live query over the plants of one grow zone, ordered by name.
    fn plants_in_zone(&self, zone: GrowZone) -> LiveQuery;

    /// Insert plants, replacing any stored plant with the same id.
    async fn insert_all(&self, plants: &[Plant]) -> GreenhouseResult<()>;
}

/// Remote plant catalogue.
#[async_trait]
pub trait PlantService: Send + Sync {
    /// Fetch the whole catalogue.
    async fn all_plants(&self) -> GreenhouseResult<Vec<Plant>>;

    /// Fetch the plants of a single grow zone.
    async fn plants_by_zone(&self, zone: GrowZone) -> GreenhouseResult<Vec<Plant>>;

    /// Fetch the custom display order for plants.
    async fn custom_sort_order(&self) -> GreenhouseResult<OrderList>;
}
