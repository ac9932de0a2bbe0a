//! Demo remote service.
//!
//! Serves the bundled JSON catalogue and sort order as if they came over the
//! network: every request waits out a simulated latency, gives up after a
//! request timeout, and parses the response body.

use std::time::Duration;

use async_trait::async_trait;
use greenhouse_core::{GreenhouseResult, GrowZone, OrderList, Plant, RemoteError};
use greenhouse_storage::PlantService;
use serde::de::DeserializeOwned;
use tracing::debug;

const BUNDLED_PLANTS: &str = include_str!("../data/plants.json");
const BUNDLED_SORT_ORDER: &str = include_str!("../data/plant_sort_order.json");

/// Remote service backed by in-process JSON bodies.
#[derive(Debug, Clone)]
pub struct DemoPlantService {
    plants_body: String,
    sort_order_body: String,
    latency: Duration,
    request_timeout: Duration,
}

impl DemoPlantService {
    pub fn new(plants_body: impl Into<String>, sort_order_body: impl Into<String>) -> Self {
        Self {
            plants_body: plants_body.into(),
            sort_order_body: sort_order_body.into(),
            latency: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Service answering with the catalogue shipped in `data/`.
    pub fn bundled() -> Self {
        Self::new(BUNDLED_PLANTS, BUNDLED_SORT_ORDER)
    }

    /// Simulated network latency per request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn respond<T: DeserializeOwned>(&self, endpoint: &str, body: &str) -> GreenhouseResult<T> {
        tokio::time::timeout(self.request_timeout, tokio::time::sleep(self.latency))
            .await
            .map_err(|_| RemoteError::Timeout {
                endpoint: endpoint.to_string(),
                after: self.request_timeout,
            })?;

        let parsed = serde_json::from_str(body).map_err(|e| RemoteError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        debug!(endpoint, bytes = body.len(), "Response received");
        Ok(parsed)
    }
}

#[async_trait]
impl PlantService for DemoPlantService {
    async fn all_plants(&self) -> GreenhouseResult<Vec<Plant>> {
        self.respond("plants", &self.plants_body).await
    }

    async fn plants_by_zone(&self, zone: GrowZone) -> GreenhouseResult<Vec<Plant>> {
        let plants: Vec<Plant> = self.respond("plants_by_zone", &self.plants_body).await?;
        Ok(plants.into_iter().filter(|plant| plant.grow_zone == zone).collect())
    }

    async fn custom_sort_order(&self) -> GreenhouseResult<OrderList> {
        self.respond("custom_plant_sort_order", &self.sort_order_body).await
    }
}
