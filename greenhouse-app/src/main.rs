//! Greenhouse demo entry point.
//!
//! Initializes logging, loads repository configuration from the
//! environment, composes one repository, and runs the walkthrough.

use std::sync::Arc;
use std::time::Duration;

use greenhouse_app::{init_logging, run_demo, AppResult, DemoPlantService, TelemetryConfig};
use greenhouse_core::{GrowZone, RepositoryConfig};
use greenhouse_storage::{InMemoryPlantStore, PlantRepository};

#[tokio::main]
async fn main() -> AppResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_logging(&telemetry_config)?;

    let config = RepositoryConfig::from_env()?;
    tracing::debug!(?config, "Repository configuration loaded");

    let latency_ms = std::env::var("GREENHOUSE_DEMO_LATENCY_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(150);
    let zone = std::env::var("GREENHOUSE_DEMO_ZONE")
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .map(GrowZone::new)
        .unwrap_or(GrowZone(9));

    let store = Arc::new(InMemoryPlantStore::new());
    let service = Arc::new(
        DemoPlantService::bundled().with_latency(Duration::from_millis(latency_ms)),
    );
    let repo = PlantRepository::new(store, service, config);

    tokio::select! {
        result = run_demo(&repo, zone) => {
            let report = result?;
            tracing::info!(
                plants = report.sorted.len(),
                feed_updates = report.feed_updates,
                "Demo complete"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
