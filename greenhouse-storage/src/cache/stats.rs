//! Counters for single-flight caches.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about a single-flight cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightStats {
    /// Number of underlying fetches started.
    pub fetches: u64,
    /// Number of calls answered from the resolved value.
    pub hits: u64,
    /// Number of calls that joined a fetch already in flight.
    pub waits: u64,
    /// Number of times the fallback replaced a failed fetch.
    pub fallbacks: u64,
    /// Number of callers that gave up waiting and took the fallback.
    pub timeouts: u64,
}

impl FlightStats {
    /// Total number of calls observed.
    pub fn requests(&self) -> u64 {
        self.hits + self.waits + self.fetches
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters behind [`FlightStats`].
#[derive(Debug, Default)]
pub(crate) struct FlightCounters {
    fetches: AtomicU64,
    hits: AtomicU64,
    waits: AtomicU64,
    fallbacks: AtomicU64,
    timeouts: AtomicU64,
}

impl FlightCounters {
    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> FlightStats {
        FlightStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}
