//! Single-flight memoization of one asynchronously produced value.
//!
//! [`SingleFlight`] runs its fetch at most once per instance. Every caller
//! that arrives before the fetch completes joins the same in-flight future;
//! every caller after that reads the published value without locking.
//!
//! # State machine
//!
//! ```text
//! Empty --first caller--> Pending(shared fetch) --fetch done--> Resolved(value)
//! ```
//!
//! A failed fetch resolves to the fallback value. Resolution is permanent:
//! there is no expiry and no retry.
//!
//! # Cancellation
//!
//! Inside a tokio runtime the fetch runs on its own task, so dropping a
//! waiter (or every waiter) never cancels it. Without a runtime the waiters
//! drive the shared future themselves.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use greenhouse_core::GreenhouseResult;
use tracing::{debug, warn};

use super::stats::{FlightCounters, FlightStats};

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, GreenhouseResult<T>> + Send + Sync>;
type FallbackFn<T> = Arc<dyn Fn() -> T + Send + Sync>;
type Flight<T> = Shared<BoxFuture<'static, T>>;

enum CacheState<T: Clone> {
    Empty,
    Pending(Flight<T>),
    Resolved(T),
}

/// Observable phase of a [`SingleFlight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStateKind {
    Empty,
    Pending,
    Resolved,
}

enum Ticket<T: Clone> {
    Ready(T),
    Wait(Flight<T>),
}

/// Memoizes one value, collapsing concurrent requests into one fetch.
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    /// Name used in log events.
    name: &'static str,
    /// Published value; the lock-free fast path.
    resolved: Arc<OnceLock<T>>,
    /// Guards the Empty -> Pending transition. Never held across an await.
    state: Mutex<CacheState<T>>,
    fetch: FetchFn<T>,
    fallback: FallbackFn<T>,
    counters: Arc<FlightCounters>,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    /// Create an empty cell.
    ///
    /// `fetch` is invoked at most once, on the first request. `fallback`
    /// supplies the value when the fetch fails.
    pub fn new<F, Fut, B>(name: &'static str, fetch: F, fallback: B) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GreenhouseResult<T>> + Send + 'static,
        B: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            name,
            resolved: Arc::new(OnceLock::new()),
            state: Mutex::new(CacheState::Empty),
            fetch: Arc::new(move || fetch().boxed()),
            fallback: Arc::new(fallback),
            counters: Arc::new(FlightCounters::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the value, starting or joining the fetch if it isn't resolved yet.
    ///
    /// Never fails: a failed fetch resolves to the fallback.
    pub async fn get_or_await(&self) -> T {
        if let Some(value) = self.resolved.get() {
            self.counters.record_hit();
            return value.clone();
        }

        match self.ticket() {
            Ticket::Ready(value) => value,
            Ticket::Wait(flight) => {
                let value = flight.await;
                self.settle(value)
            }
        }
    }

    /// Like [`get_or_await`](Self::get_or_await), but this caller gives up
    /// after `limit` and takes the fallback.
    ///
    /// Giving up does not abort the fetch: it keeps running for the other
    /// waiters and still resolves the cell. Without a tokio runtime there is
    /// no timer, so the caller waits for the fetch like `get_or_await`.
    pub async fn get_or_await_within(&self, limit: Duration) -> T {
        if let Some(value) = self.resolved.get() {
            self.counters.record_hit();
            return value.clone();
        }

        match self.ticket() {
            Ticket::Ready(value) => value,
            Ticket::Wait(flight) if tokio::runtime::Handle::try_current().is_err() => {
                let value = flight.await;
                self.settle(value)
            }
            Ticket::Wait(flight) => match tokio::time::timeout(limit, flight).await {
                Ok(value) => self.settle(value),
                Err(_) => {
                    self.counters.record_timeout();
                    warn!(
                        cache = self.name,
                        limit_ms = limit.as_millis() as u64,
                        "Timed out waiting for fetch, using fallback for this call"
                    );
                    (self.fallback)()
                }
            },
        }
    }

    /// The resolved value, if any. Never waits and never starts a fetch.
    pub fn peek(&self) -> Option<T> {
        self.resolved.get().cloned()
    }

    pub fn state(&self) -> CacheStateKind {
        if self.resolved.get().is_some() {
            return CacheStateKind::Resolved;
        }
        match &*self.lock_state() {
            CacheState::Empty => CacheStateKind::Empty,
            CacheState::Pending(_) => CacheStateKind::Pending,
            CacheState::Resolved(_) => CacheStateKind::Resolved,
        }
    }

    pub fn stats(&self) -> FlightStats {
        self.counters.snapshot()
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState<T>> {
        // The state is only ever replaced wholesale, so a poisoned guard
        // still holds a consistent value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide under the lock whether to start, join, or skip the fetch.
    fn ticket(&self) -> Ticket<T> {
        let mut state = self.lock_state();
        match &*state {
            CacheState::Resolved(value) => {
                self.counters.record_hit();
                Ticket::Ready(value.clone())
            }
            CacheState::Pending(flight) => {
                self.counters.record_wait();
                Ticket::Wait(flight.clone())
            }
            CacheState::Empty => {
                self.counters.record_fetch();
                let flight = self.launch();
                *state = CacheState::Pending(flight.clone());
                debug!(cache = self.name, "Fetch started");
                Ticket::Wait(flight)
            }
        }
    }

    /// Build the shared fetch future. The fetch closure itself is only
    /// invoked once the future is polled, outside the state lock.
    fn launch(&self) -> Flight<T> {
        let name = self.name;
        let fetch = Arc::clone(&self.fetch);
        let fallback = Arc::clone(&self.fallback);
        let resolved = Arc::clone(&self.resolved);
        let counters = Arc::clone(&self.counters);

        let flight = async move {
            let value = match fetch().await {
                Ok(value) => {
                    debug!(cache = name, "Fetch succeeded");
                    value
                }
                Err(err) => {
                    counters.record_fallback();
                    warn!(cache = name, error = %err, "Fetch failed, using fallback");
                    fallback()
                }
            };
            resolved.get_or_init(|| value).clone()
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(flight);
                let fallback = Arc::clone(&self.fallback);
                let resolved = Arc::clone(&self.resolved);
                let counters = Arc::clone(&self.counters);
                async move {
                    match task.await {
                        Ok(value) => value,
                        Err(err) => {
                            counters.record_fallback();
                            warn!(cache = name, error = %err, "Fetch task failed, using fallback");
                            resolved.get_or_init(|| fallback()).clone()
                        }
                    }
                }
                .boxed()
                .shared()
            }
            Err(_) => flight.boxed().shared(),
        }
    }

    /// Publish the flight's outcome and move the state to Resolved.
    fn settle(&self, value: T) -> T {
        let value = self.resolved.get_or_init(|| value).clone();
        let mut state = self.lock_state();
        if !matches!(*state, CacheState::Resolved(_)) {
            *state = CacheState::Resolved(value.clone());
            debug!(cache = self.name, "Resolved");
        }
        value
    }
}

impl<T: Clone + Send + Sync + 'static> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenhouse_core::{GreenhouseError, RemoteError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn unavailable() -> GreenhouseError {
        RemoteError::Unavailable {
            endpoint: "test".to_string(),
            reason: "down".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_resolves_once_and_memoizes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cell = SingleFlight::new(
            "numbers",
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                }
            },
            Vec::new,
        );

        assert_eq!(cell.state(), CacheStateKind::Empty);
        assert_eq!(cell.peek(), None);

        for _ in 0..5 {
            assert_eq!(cell.get_or_await().await, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.state(), CacheStateKind::Resolved);
        assert_eq!(cell.peek(), Some(vec![1, 2, 3]));

        let stats = cell.stats();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.hits, 4);
    }

    #[tokio::test]
    async fn test_failure_resolves_to_fallback_permanently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cell = SingleFlight::new(
            "failing",
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<String, _>(unavailable())
                }
            },
            || "fallback".to_string(),
        );

        assert_eq!(cell.get_or_await().await, "fallback");
        assert_eq!(cell.get_or_await().await, "fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.stats().fallbacks, 1);
        assert_eq!(cell.state(), CacheStateKind::Resolved);
    }

    #[tokio::test]
    async fn test_waiters_join_pending_fetch() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let cell = {
            let gate = Arc::clone(&gate);
            let calls = Arc::clone(&calls);
            Arc::new(SingleFlight::new(
                "gated",
                move || {
                    let gate = Arc::clone(&gate);
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(42u32)
                    }
                },
                || 0,
            ))
        };

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move { cell.get_or_await().await })
            })
            .collect();

        // Let every waiter reach the pending flight.
        while cell.stats().requests() < 8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cell.state(), CacheStateKind::Pending);
        gate.notify_one();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cell.stats();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.waits, 7);
    }

    #[tokio::test]
    async fn test_timed_out_waiter_gets_fallback_without_aborting_fetch() {
        let gate = Arc::new(Notify::new());
        let cell = {
            let gate = Arc::clone(&gate);
            SingleFlight::new(
                "slow",
                move || {
                    let gate = Arc::clone(&gate);
                    async move {
                        gate.notified().await;
                        Ok("fetched")
                    }
                },
                || "fallback",
            )
        };

        let early = cell.get_or_await_within(Duration::from_millis(20)).await;
        assert_eq!(early, "fallback");
        assert_eq!(cell.state(), CacheStateKind::Pending);
        assert_eq!(cell.stats().timeouts, 1);

        gate.notify_one();
        assert_eq!(cell.get_or_await().await, "fetched");
        assert_eq!(cell.stats().fetches, 1);
    }

    #[test]
    fn test_works_without_runtime() {
        let cell = SingleFlight::new("inline", || async { Ok(7u8) }, || 0);
        let value = futures_util::FutureExt::now_or_never(cell.get_or_await());
        assert_eq!(value, Some(7));
        assert_eq!(cell.peek(), Some(7));
    }

    #[test]
    fn test_wait_limit_without_runtime_awaits_fetch() {
        let cell = SingleFlight::new("inline_limited", || async { Ok(7u8) }, || 0);
        let value =
            futures_util::FutureExt::now_or_never(cell.get_or_await_within(Duration::from_millis(50)));
        assert_eq!(value, Some(7));
        assert_eq!(cell.stats().timeouts, 0);
        assert_eq!(cell.state(), CacheStateKind::Resolved);
    }
}
