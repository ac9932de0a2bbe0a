//! Caches with explicit resolution contracts.
//!
//! [`SingleFlight`] memoizes one asynchronously produced value: concurrent
//! callers share a single fetch, failures resolve to a fallback, and the
//! resolved value is read without locking afterwards.
//!
//! [`SortOrderCache`] applies it to the remotely fetched plant sort order.
//!
//! # Example
//!
//! ```ignore
//! let cache = SortOrderCache::for_service(service, &config);
//!
//! // First call fetches; concurrent callers wait for the same fetch.
//! let order = cache.get_or_await().await;
//!
//! // Later calls return the same list without touching the service.
//! assert!(cache.get_or_await().await.ptr_eq(&order));
//! ```

pub mod single_flight;
pub mod sort_order;
pub mod stats;

pub use single_flight::{CacheStateKind, SingleFlight};
pub use sort_order::SortOrderCache;
pub use stats::FlightStats;
