//! Refresh gating policies.
//!
//! Every refresh asks a [`RefreshPolicy`] first. [`AlwaysRefresh`] is the
//! default and lets every request through; [`MinIntervalRefresh`] skips a
//! target that was refreshed successfully less than an interval ago, or
//! whose refresh is still running.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use greenhouse_core::{GrowZone, PlantFilter, RepositoryConfig};

/// Data set a refresh fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    AllPlants,
    Zone(GrowZone),
}

impl From<PlantFilter> for RefreshTarget {
    fn from(filter: PlantFilter) -> Self {
        match filter {
            PlantFilter::All => Self::AllPlants,
            PlantFilter::Zone(zone) => Self::Zone(zone),
        }
    }
}

impl fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllPlants => write!(f, "all plants"),
            Self::Zone(zone) => write!(f, "{}", zone),
        }
    }
}

/// Decides whether a refresh should hit the remote service.
#[async_trait]
pub trait RefreshPolicy: Send + Sync {
    async fn should_refresh(&self, target: RefreshTarget) -> bool;

    /// Called after a refresh of `target` was written to the store.
    async fn record_refresh(&self, _target: RefreshTarget) {}

    /// Called when an allowed refresh of `target` failed.
    async fn record_failure(&self, _target: RefreshTarget) {}
}

/// Refresh on every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRefresh;

#[async_trait]
impl RefreshPolicy for AlwaysRefresh {
    async fn should_refresh(&self, _target: RefreshTarget) -> bool {
        true
    }
}

/// Refresh a target at most once per interval.
///
/// Allowing a refresh reserves the target until the refresh is recorded or
/// fails, so concurrent requests for the same target fetch once. A
/// reservation that is never settled (the refresh future was dropped)
/// expires after one interval.
#[derive(Debug)]
pub struct MinIntervalRefresh {
    interval: Duration,
    slots: Mutex<HashMap<RefreshTarget, Slot>>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    InFlight(Instant),
    Done(Instant),
}

impl MinIntervalRefresh {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<RefreshTarget, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RefreshPolicy for MinIntervalRefresh {
    async fn should_refresh(&self, target: RefreshTarget) -> bool {
        let mut slots = self.slots();
        let open = match slots.get(&target) {
            Some(Slot::InFlight(at)) | Some(Slot::Done(at)) => at.elapsed() >= self.interval,
            None => true,
        };
        if open {
            slots.insert(target, Slot::InFlight(Instant::now()));
        }
        open
    }

    async fn record_refresh(&self, target: RefreshTarget) {
        self.slots().insert(target, Slot::Done(Instant::now()));
    }

    async fn record_failure(&self, target: RefreshTarget) {
        let mut slots = self.slots();
        if matches!(slots.get(&target), Some(Slot::InFlight(_))) {
            slots.remove(&target);
        }
    }
}

/// Policy selected by the repository configuration.
pub fn policy_from_config(config: &RepositoryConfig) -> Arc<dyn RefreshPolicy> {
    match config.refresh_min_interval {
        Some(interval) => Arc::new(MinIntervalRefresh::new(interval)),
        None => Arc::new(AlwaysRefresh),
    }
}
