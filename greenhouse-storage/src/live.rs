//! Live queries over the plant store.
//!
//! A [`LiveQuery`] is a subscription: it hands out the current snapshot and
//! resolves [`LiveQuery::changed`] each time the store publishes a new one.
//! Consumers re-run whatever projection they need on every change instead
//! of relying on a reactive map operator.

use std::sync::Arc;

use greenhouse_core::{GreenhouseResult, Plant, PlantFilter, StoreError};
use tokio::sync::watch;

/// Snapshot of the stored plants as published by a store.
pub type PlantSnapshot = Arc<Vec<Plant>>;

/// Subscription to a filtered view of the store.
#[derive(Debug, Clone)]
pub struct LiveQuery {
    rx: watch::Receiver<PlantSnapshot>,
    filter: PlantFilter,
}

impl LiveQuery {
    /// Wrap a store's snapshot channel.
    pub fn new(rx: watch::Receiver<PlantSnapshot>, filter: PlantFilter) -> Self {
        Self { rx, filter }
    }

    pub fn filter(&self) -> PlantFilter {
        self.filter
    }

    /// Current matching plants. Marks the current snapshot as seen, so the
    /// next [`changed`](Self::changed) waits for a newer one.
    pub fn current(&mut self) -> PlantSnapshot {
        let snapshot = self.rx.borrow_and_update().clone();
        self.apply_filter(snapshot)
    }

    /// Current matching plants without marking the snapshot as seen.
    pub fn peek(&self) -> PlantSnapshot {
        let snapshot = self.rx.borrow().clone();
        self.apply_filter(snapshot)
    }

    /// Wait until the store publishes a snapshot newer than the last one
    /// returned by [`current`](Self::current).
    ///
    /// Fails with [`StoreError::Closed`] once the store has been dropped.
    pub async fn changed(&mut self) -> GreenhouseResult<()> {
        self.rx.changed().await.map_err(|_| StoreError::Closed)?;
        Ok(())
    }

    fn apply_filter(&self, snapshot: PlantSnapshot) -> PlantSnapshot {
        match self.filter {
            PlantFilter::All => snapshot,
            PlantFilter::Zone(_) => Arc::new(
                snapshot
                    .iter()
                    .filter(|plant| self.filter.matches(plant))
                    .cloned()
                    .collect(),
            ),
        }
    }
}
