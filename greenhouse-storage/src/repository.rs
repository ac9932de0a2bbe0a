//! Plant repository.
//!
//! Composes the local store, the remote service, the sort-order cache and
//! the refresh policy. The application builds one repository and shares it;
//! clones are cheap and share every collaborator, including the cache.

use std::sync::Arc;

use greenhouse_core::{GreenhouseResult, GrowZone, OrderList, Plant, PlantFilter, RepositoryConfig};
use tracing::{debug, error, info, instrument};

use crate::cache::SortOrderCache;
use crate::feed::{project, SortedFeed};
use crate::live::LiveQuery;
use crate::refresh::{policy_from_config, RefreshPolicy, RefreshTarget};
use crate::traits::{PlantService, PlantStore};

/// Repository over a plant store and a remote plant service.
///
/// # Type Parameters
///
/// - `S`: the local store that owns plant rows and live queries
/// - `R`: the remote service used for refreshes and the sort order
pub struct PlantRepository<S, R>
where
    S: PlantStore + 'static,
    R: PlantService + 'static,
{
    store: Arc<S>,
    service: Arc<R>,
    sort_order: Arc<SortOrderCache>,
    policy: Arc<dyn RefreshPolicy>,
    config: RepositoryConfig,
}

impl<S, R> PlantRepository<S, R>
where
    S: PlantStore + 'static,
    R: PlantService + 'static,
{
    /// Create a repository. The sort-order cache and refresh policy are
    /// derived from `config`.
    pub fn new(store: Arc<S>, service: Arc<R>, config: RepositoryConfig) -> Self {
        let sort_order = Arc::new(SortOrderCache::for_service(Arc::clone(&service), &config));
        let policy = policy_from_config(&config);
        Self {
            store,
            service,
            sort_order,
            policy,
            config,
        }
    }

    /// Create a repository with default configuration.
    pub fn with_defaults(store: Arc<S>, service: Arc<R>) -> Self {
        Self::new(store, service, RepositoryConfig::default())
    }

    /// Replace the refresh policy.
    pub fn with_policy(mut self, policy: Arc<dyn RefreshPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn service(&self) -> &R {
        &self.service
    }

    pub fn sort_order_cache(&self) -> &SortOrderCache {
        &self.sort_order
    }

    // ========================================================================
    // LIVE QUERIES
    // ========================================================================

    /// Every stored plant, in store order.
    pub fn plants(&self) -> LiveQuery {
        self.store.plants()
    }

    /// Stored plants of one zone, in store order.
    pub fn plants_in_zone(&self, zone: GrowZone) -> LiveQuery {
        self.store.plants_in_zone(zone)
    }

    pub fn plants_for(&self, filter: PlantFilter) -> LiveQuery {
        match filter {
            PlantFilter::All => self.plants(),
            PlantFilter::Zone(zone) => self.plants_in_zone(zone),
        }
    }

    // ========================================================================
    // SORTED READS
    // ========================================================================

    /// The custom sort order, fetched on first use.
    pub async fn sort_order(&self) -> OrderList {
        self.sort_order.get_or_await().await
    }

    /// Current plants sorted by the custom order.
    pub async fn sorted_plants(&self) -> Vec<Plant> {
        self.sorted_plants_for(PlantFilter::All).await
    }

    /// Current plants of one zone sorted by the custom order.
    ///
    /// [`GrowZone::NONE`] reads the whole catalogue.
    pub async fn sorted_plants_in_zone(&self, zone: GrowZone) -> Vec<Plant> {
        self.sorted_plants_for(PlantFilter::from(zone)).await
    }

    #[instrument(skip_all, fields(filter = %filter))]
    pub async fn sorted_plants_for(&self, filter: PlantFilter) -> Vec<Plant> {
        let plants = self.plants_for(filter).current();
        let order = self.sort_order().await;
        project(plants, order, self.config.sort_offload_threshold).await
    }

    /// Live sorted view; re-sorted on every store change.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn sorted_feed(&self, filter: PlantFilter) -> SortedFeed {
        SortedFeed::spawn(
            self.plants_for(filter),
            Arc::clone(&self.sort_order),
            self.config.sort_offload_threshold,
        )
    }

    // ========================================================================
    // REFRESH
    // ========================================================================

    /// Fetch the whole catalogue and store it, if the policy allows.
    pub async fn refresh_plants(&self) -> GreenhouseResult<()> {
        self.refresh(RefreshTarget::AllPlants).await
    }

    /// Fetch one zone and store it, if the policy allows.
    ///
    /// [`GrowZone::NONE`] refreshes the whole catalogue.
    pub async fn refresh_plants_for_zone(&self, zone: GrowZone) -> GreenhouseResult<()> {
        self.refresh(RefreshTarget::from(PlantFilter::from(zone))).await
    }

    #[instrument(skip_all, fields(target = %target))]
    async fn refresh(&self, target: RefreshTarget) -> GreenhouseResult<()> {
        if !self.policy.should_refresh(target).await {
            debug!("Refresh skipped by policy");
            return Ok(());
        }

        let count = match self.fetch_and_store(target).await {
            Ok(count) => count,
            Err(err) => {
                self.policy.record_failure(target).await;
                return Err(err);
            }
        };

        self.policy.record_refresh(target).await;
        info!(count, "Refresh complete");
        Ok(())
    }

    async fn fetch_and_store(&self, target: RefreshTarget) -> GreenhouseResult<usize> {
        let fetched = match target {
            RefreshTarget::AllPlants => self.service.all_plants().await,
            RefreshTarget::Zone(zone) => self.service.plants_by_zone(zone).await,
        };
        let plants = fetched.inspect_err(|err| error!(error = %err, "Remote fetch failed"))?;

        self.store
            .insert_all(&plants)
            .await
            .inspect_err(|err| error!(error = %err, "Store write failed"))?;
        Ok(plants.len())
    }
}

impl<S, R> Clone for PlantRepository<S, R>
where
    S: PlantStore + 'static,
    R: PlantService + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            service: Arc::clone(&self.service),
            sort_order: Arc::clone(&self.sort_order),
            policy: Arc::clone(&self.policy),
            config: self.config.clone(),
        }
    }
}
