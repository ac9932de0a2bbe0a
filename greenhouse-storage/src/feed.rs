//! Sorted live feeds.
//!
//! A [`SortedFeed`] subscribes to a store [`LiveQuery`] and re-sorts the
//! plants with the cached order on every store change, and once more when
//! a sort that timed out on the order fetch can use the fetched order.
//! Consumers read the latest sorted list or wait for the next one.

use std::sync::Arc;

use greenhouse_core::{OrderList, Plant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::cache::SortOrderCache;
use crate::live::{LiveQuery, PlantSnapshot};
use crate::projector::SortingProjector;

/// Sort `plants`, moving large lists to the blocking pool.
pub(crate) async fn project(
    plants: PlantSnapshot,
    order: OrderList,
    offload_threshold: usize,
) -> Vec<Plant> {
    if plants.len() >= offload_threshold {
        SortingProjector::apply_sort_offloaded(plants, order).await
    } else {
        SortingProjector::apply_sort(&plants, &order)
    }
}

/// Continuously sorted view of a live query.
///
/// Dropping the feed stops its background task.
#[derive(Debug)]
pub struct SortedFeed {
    rx: watch::Receiver<Option<PlantSnapshot>>,
    task: JoinHandle<()>,
}

impl SortedFeed {
    /// Start the feed on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(query: LiveQuery, cache: Arc<SortOrderCache>, offload_threshold: usize) -> Self {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(run_feed(query, cache, offload_threshold, tx));
        Self { rx, task }
    }

    /// The most recent sorted list, or `None` before the first one is ready.
    pub fn latest(&self) -> Option<PlantSnapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for a sorted list newer than the last one returned.
    ///
    /// Returns `None` once the feed has ended because the store closed.
    pub async fn next(&mut self) -> Option<PlantSnapshot> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(plants) = self.rx.borrow_and_update().clone() {
                return Some(plants);
            }
        }
    }

    /// Returns true once the background task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SortedFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_feed(
    mut query: LiveQuery,
    cache: Arc<SortOrderCache>,
    offload_threshold: usize,
    tx: watch::Sender<Option<PlantSnapshot>>,
) {
    let filter = query.filter();
    loop {
        let plants = query.current();
        let order = cache.get_or_await().await;
        // A timed-out wait sorts with the fallback; re-sort once the fetch lands.
        let provisional = cache.peek().map_or(true, |resolved| !resolved.ptr_eq(&order));
        let sorted = Arc::new(project(plants, order, offload_threshold).await);

        let published = tx.send_if_modified(|slot| {
            if slot.as_deref() == Some(sorted.as_ref()) {
                false
            } else {
                *slot = Some(Arc::clone(&sorted));
                true
            }
        });
        trace!(%filter, count = sorted.len(), published, provisional, "Feed sorted");

        let changed = if provisional {
            tokio::select! {
                changed = query.changed() => changed,
                _ = cache.resolved() => {
                    debug!(%filter, "Sort order resolved, re-sorting feed");
                    Ok(())
                }
            }
        } else {
            query.changed().await
        };
        if changed.is_err() {
            debug!(%filter, "Store closed, ending sorted feed");
            return;
        }
    }
}
