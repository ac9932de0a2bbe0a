//! Greenhouse demo host.
//!
//! Wires one [`PlantRepository`] out of an in-memory store and the demo
//! remote service, then walks through refreshes, sorted reads, and a live
//! sorted feed while logging what happens.

pub mod demo;
pub mod error;
pub mod telemetry;

pub use demo::DemoPlantService;
pub use error::{AppError, AppResult};
pub use telemetry::{init_logging, TelemetryConfig};

use std::time::Duration;

use greenhouse_core::{GrowZone, Plant, PlantFilter};
use greenhouse_storage::{PlantRepository, PlantService, PlantStore};
use tracing::{info, warn};

/// How long the demo waits for the live feed to catch up with a refresh.
const FEED_WAIT: Duration = Duration::from_secs(5);

/// What the walkthrough observed.
#[derive(Debug, Clone, Default)]
pub struct DemoReport {
    pub sorted: Vec<Plant>,
    pub sorted_zone: Vec<Plant>,
    pub feed_updates: usize,
}

/// Run the walkthrough against `repo`.
pub async fn run_demo<S, R>(repo: &PlantRepository<S, R>, zone: GrowZone) -> AppResult<DemoReport>
where
    S: PlantStore + 'static,
    R: PlantService + 'static,
{
    let mut feed = repo.sorted_feed(PlantFilter::from(zone));
    let mut report = DemoReport::default();

    repo.refresh_plants_for_zone(zone).await?;
    report.sorted_zone = repo.sorted_plants_in_zone(zone).await;
    info!(%zone, plants = ?plant_names(&report.sorted_zone), "Sorted zone");

    repo.refresh_plants().await?;
    report.sorted = repo.sorted_plants().await;
    info!(plants = ?plant_names(&report.sorted), "Sorted catalogue");

    while let Ok(Some(update)) = tokio::time::timeout(FEED_WAIT, feed.next()).await {
        report.feed_updates += 1;
        info!(%zone, plants = ?plant_names(&update), "Feed update");
        if update.len() == report.sorted_zone.len() {
            break;
        }
    }
    if report.feed_updates == 0 {
        warn!(%zone, "Feed produced no updates");
    }

    let stats = repo.sort_order_cache().stats();
    info!(
        fetches = stats.fetches,
        hits = stats.hits,
        waits = stats.waits,
        fallbacks = stats.fallbacks,
        hit_rate = stats.hit_rate(),
        "Sort order cache"
    );
    Ok(report)
}

fn plant_names(plants: &[Plant]) -> Vec<&str> {
    plants.iter().map(|plant| plant.name.as_str()).collect()
}
