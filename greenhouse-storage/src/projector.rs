//! Custom-order sorting of record lists.
//!
//! Records are ranked by the first position of their id in an [`OrderList`].
//! Records missing from the list sink to the end. Ties (including all
//! unranked records) are broken by display name, and the sort is stable, so
//! records with identical keys keep their input order.

use std::collections::HashMap;
use std::sync::Arc;

use greenhouse_core::{OrderList, SortableRecord};
use tracing::warn;

/// Rank position given to records that don't appear in the order list.
pub const UNRANKED: usize = usize::MAX;

/// Composite sort key: position in the order list, then display name.
///
/// Field order matters: the derived `Ord` compares `position` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankKey<'a> {
    pub position: usize,
    pub name: &'a str,
}

impl<'a> RankKey<'a> {
    pub fn new(position: usize, name: &'a str) -> Self {
        Self { position, name }
    }

    pub fn is_ranked(&self) -> bool {
        self.position != UNRANKED
    }
}

/// Sorts records by an externally supplied order list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortingProjector;

impl SortingProjector {
    /// Return a new list with `records` ordered by `order`.
    ///
    /// Pure and total: empty inputs yield an empty or name-sorted result.
    pub fn apply_sort<R>(records: &[R], order: &OrderList) -> Vec<R>
    where
        R: SortableRecord + Clone,
    {
        let positions = first_positions(order);
        let mut ranked: Vec<(RankKey<'_>, &R)> = records
            .iter()
            .map(|record| (rank_key(record, &positions), record))
            .collect();

        // `sort_by` is stable.
        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        ranked.into_iter().map(|(_, record)| record.clone()).collect()
    }

    /// Compute the rank key of a single record.
    pub fn rank_of<'a, R: SortableRecord>(record: &'a R, order: &OrderList) -> RankKey<'a> {
        RankKey::new(
            order.position_of(record.record_id()).unwrap_or(UNRANKED),
            record.display_name(),
        )
    }

    /// Same as [`apply_sort`](Self::apply_sort), run on the blocking pool.
    ///
    /// Used for large lists so sorting doesn't stall the async workers. If
    /// the blocking task can't complete, the sort runs inline instead.
    pub async fn apply_sort_offloaded<R>(records: Arc<Vec<R>>, order: OrderList) -> Vec<R>
    where
        R: SortableRecord + Clone + Send + Sync + 'static,
    {
        let shared = Arc::clone(&records);
        let shared_order = order.clone();
        match tokio::task::spawn_blocking(move || Self::apply_sort(&shared, &shared_order)).await {
            Ok(sorted) => sorted,
            Err(err) => {
                warn!(error = %err, "Blocking sort failed, sorting inline");
                Self::apply_sort(&records, &order)
            }
        }
    }
}

fn first_positions(order: &OrderList) -> HashMap<&str, usize> {
    let mut positions = HashMap::with_capacity(order.len());
    for (index, id) in order.iter().enumerate() {
        positions.entry(id).or_insert(index);
    }
    positions
}

fn rank_key<'a, R: SortableRecord>(record: &'a R, positions: &HashMap<&str, usize>) -> RankKey<'a> {
    RankKey::new(
        positions
            .get(record.record_id())
            .copied()
            .unwrap_or(UNRANKED),
        record.display_name(),
    )
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use greenhouse_core::Plant;
    use proptest::prelude::*;

    fn arb_plants() -> impl Strategy<Value = Vec<Plant>> {
        prop::collection::vec(("[a-e]", "[A-Z][a-z]{0,3}"), 0..20)
            .prop_map(|pairs| pairs.into_iter().map(|(id, name)| Plant::new(id, name)).collect())
    }

    fn arb_order() -> impl Strategy<Value = OrderList> {
        prop::collection::vec("[a-f]", 0..8).prop_map(OrderList::from)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Output is a permutation of the input.
        #[test]
        fn prop_sort_is_permutation(plants in arb_plants(), order in arb_order()) {
            let sorted = SortingProjector::apply_sort(&plants, &order);
            prop_assert_eq!(sorted.len(), plants.len());

            let mut expected: Vec<_> = plants.iter().map(|p| (p.plant_id.clone(), p.name.clone())).collect();
            let mut actual: Vec<_> = sorted.iter().map(|p| (p.plant_id.clone(), p.name.clone())).collect();
            expected.sort();
            actual.sort();
            prop_assert_eq!(expected, actual);
        }

        /// Adjacent output records are ordered by rank key.
        #[test]
        fn prop_sort_is_ordered_by_rank_key(plants in arb_plants(), order in arb_order()) {
            let sorted = SortingProjector::apply_sort(&plants, &order);
            for pair in sorted.windows(2) {
                let left = SortingProjector::rank_of(&pair[0], &order);
                let right = SortingProjector::rank_of(&pair[1], &order);
                prop_assert!(left <= right, "{:?} sorted after {:?}", right, left);
            }
        }

        /// Sorting twice changes nothing.
        #[test]
        fn prop_sort_is_idempotent(plants in arb_plants(), order in arb_order()) {
            let once = SortingProjector::apply_sort(&plants, &order);
            let twice = SortingProjector::apply_sort(&once, &order);
            prop_assert_eq!(once, twice);
        }
    }
}
