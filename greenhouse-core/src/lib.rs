//! Greenhouse Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace.
//! Business logic (caching, sorting, refreshing) lives in greenhouse-storage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod config;
pub mod error;

pub use config::RepositoryConfig;
pub use error::{ConfigError, GreenhouseError, GreenhouseResult, RemoteError, StoreError};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Plant identifier as delivered by the remote catalogue.
pub type PlantId = String;

/// Default watering interval in days for plants that don't specify one.
pub const DEFAULT_WATERING_INTERVAL: i32 = 7;

/// Growing zone a plant is suited for.
///
/// Treated as an opaque partition key: the repository only compares zones
/// for equality and forwards them to the store and the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrowZone(pub i32);

impl GrowZone {
    /// Sentinel meaning "no zone selected".
    pub const NONE: GrowZone = GrowZone(-1);

    pub fn new(number: i32) -> Self {
        Self(number)
    }

    pub fn number(self) -> i32 {
        self.0
    }

    /// Returns true if this is the [`GrowZone::NONE`] sentinel.
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl Default for GrowZone {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for GrowZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone {}", self.0)
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

/// A plant in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub plant_id: PlantId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "growZoneNumber", default)]
    pub grow_zone: GrowZone,
    /// How often the plant should be watered, in days.
    #[serde(default = "default_watering_interval")]
    pub watering_interval: i32,
    #[serde(default)]
    pub image_url: String,
}

fn default_watering_interval() -> i32 {
    DEFAULT_WATERING_INTERVAL
}

impl Plant {
    /// Create a plant with the given id and name and defaults for the rest.
    pub fn new(plant_id: impl Into<PlantId>, name: impl Into<String>) -> Self {
        Self {
            plant_id: plant_id.into(),
            name: name.into(),
            description: String::new(),
            grow_zone: GrowZone::NONE,
            watering_interval: DEFAULT_WATERING_INTERVAL,
            image_url: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_grow_zone(mut self, zone: GrowZone) -> Self {
        self.grow_zone = zone;
        self
    }

    pub fn with_watering_interval(mut self, days: i32) -> Self {
        self.watering_interval = days;
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }
}

/// A record that can be ranked by an [`OrderList`].
///
/// The projector only needs an identifier to look up in the order list and
/// a display name for tie-breaking.
pub trait SortableRecord {
    fn record_id(&self) -> &str;
    fn display_name(&self) -> &str;
}

impl SortableRecord for Plant {
    fn record_id(&self) -> &str {
        &self.plant_id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

impl<T: SortableRecord + ?Sized> SortableRecord for &T {
    fn record_id(&self) -> &str {
        (**self).record_id()
    }

    fn display_name(&self) -> &str {
        (**self).display_name()
    }
}

// ============================================================================
// ORDER LIST
// ============================================================================

/// Desired display rank as an ordered list of record identifiers.
///
/// Immutable once built. Clones share the same backing storage, so handing
/// the cached list to many callers costs a reference count bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderList(Arc<[PlantId]>);

impl OrderList {
    pub fn new(ids: Vec<PlantId>) -> Self {
        Self(ids.into())
    }

    /// An order list that ranks nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the first occurrence of `id`, if any.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|candidate| candidate == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[PlantId] {
        &self.0
    }

    /// Returns true if both lists share the same backing allocation.
    pub fn ptr_eq(&self, other: &OrderList) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for OrderList {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<PlantId>> for OrderList {
    fn from(ids: Vec<PlantId>) -> Self {
        Self::new(ids)
    }
}

impl From<Vec<&str>> for OrderList {
    fn from(ids: Vec<&str>) -> Self {
        Self::new(ids.into_iter().map(str::to_owned).collect())
    }
}

impl FromIterator<PlantId> for OrderList {
    fn from_iter<I: IntoIterator<Item = PlantId>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Serialize for OrderList {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OrderList {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<PlantId>::deserialize(deserializer).map(Self::new)
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// Which slice of the catalogue a query should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlantFilter {
    All,
    Zone(GrowZone),
}

impl PlantFilter {
    pub fn matches(&self, plant: &Plant) -> bool {
        match self {
            Self::All => true,
            Self::Zone(zone) => plant.grow_zone == *zone,
        }
    }
}

impl From<GrowZone> for PlantFilter {
    /// [`GrowZone::NONE`] selects the whole catalogue.
    fn from(zone: GrowZone) -> Self {
        if zone.is_none() {
            Self::All
        } else {
            Self::Zone(zone)
        }
    }
}

impl fmt::Display for PlantFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all plants"),
            Self::Zone(zone) => write!(f, "{}", zone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_list_position_is_first_match() {
        let order = OrderList::from(vec!["b", "a", "b"]);
        assert_eq!(order.position_of("b"), Some(0));
        assert_eq!(order.position_of("a"), Some(1));
        assert_eq!(order.position_of("c"), None);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_order_list_clones_share_storage() {
        let order = OrderList::from(vec!["x"]);
        let copy = order.clone();
        assert!(order.ptr_eq(&copy));
        assert!(!order.ptr_eq(&OrderList::from(vec!["x"])));
    }

    #[test]
    fn test_grow_zone_none_maps_to_all() {
        assert_eq!(PlantFilter::from(GrowZone::NONE), PlantFilter::All);
        assert_eq!(PlantFilter::from(GrowZone(9)), PlantFilter::Zone(GrowZone(9)));
    }

    #[test]
    fn test_filter_matches_zone() {
        let plant = Plant::new("p1", "Pepper").with_grow_zone(GrowZone(3));
        assert!(PlantFilter::All.matches(&plant));
        assert!(PlantFilter::Zone(GrowZone(3)).matches(&plant));
        assert!(!PlantFilter::Zone(GrowZone(4)).matches(&plant));
    }

    #[test]
    fn test_plant_deserializes_catalogue_json() {
        let json = r#"{
            "plantId": "malus-pumila",
            "name": "Apple",
            "description": "An apple tree",
            "growZoneNumber": 3
        }"#;
        let plant: Plant = serde_json::from_str(json).unwrap();
        assert_eq!(plant.plant_id, "malus-pumila");
        assert_eq!(plant.grow_zone, GrowZone(3));
        assert_eq!(plant.watering_interval, DEFAULT_WATERING_INTERVAL);
        assert!(plant.image_url.is_empty());
    }

    #[test]
    fn test_order_list_json_is_plain_array() {
        let order: OrderList = serde_json::from_str(r#"["b","a"]"#).unwrap();
        assert_eq!(order, OrderList::from(vec!["b", "a"]));
        assert_eq!(serde_json::to_string(&order).unwrap(), r#"["b","a"]"#);
    }
}
