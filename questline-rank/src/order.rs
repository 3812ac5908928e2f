//! Ordering and rank assignment.
//!
//! One comparator serves both views because the source shapes each view's
//! [`ScoredEntity`]: all-time carries `(total, level)`, weekly carries
//! `(windowed, total)`. The chain ends in `display_key`, so only true
//! duplicates compare equal, and those keep their input order.

use questline_core::{RankedEntry, ScoredEntity};
use std::cmp::Ordering;

/// `(score DESC, secondary_score DESC, display_key ASC)`.
pub fn compare(a: &ScoredEntity, b: &ScoredEntity) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.secondary_score.cmp(&a.secondary_score))
        .then_with(|| a.display_key.cmp(&b.display_key))
}

/// True if `a` ranks strictly ahead of `b`.
pub fn is_ahead(a: &ScoredEntity, b: &ScoredEntity) -> bool {
    compare(a, b) == Ordering::Less
}

/// Stable sort into rank order.
pub fn sort_entities(entities: &mut [ScoredEntity]) {
    entities.sort_by(compare);
}

/// Sort `entities` and number them from `first_rank`, one rank per entity.
pub fn assign_ranks(mut entities: Vec<ScoredEntity>, first_rank: u64) -> Vec<RankedEntry> {
    sort_entities(&mut entities);
    entities
        .into_iter()
        .enumerate()
        .map(|(i, entity)| RankedEntry {
            entity,
            rank: first_rank + i as u64,
        })
        .collect()
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn population() -> impl Strategy<Value = Vec<ScoredEntity>> {
        prop::collection::vec((0u64..50, 0u64..5), 0..40).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (score, secondary))| {
                    ScoredEntity::new(
                        Uuid::from_u128(i as u128 + 1),
                        score,
                        secondary,
                        format!("user{i:03}"),
                    )
                })
                .collect()
        })
    }

    proptest! {
        /// Property: ranks are exactly 1..=n and scores never increase down the board.
        #[test]
        fn prop_ranks_dense_and_ordered(entities in population()) {
            let n = entities.len() as u64;
            let ranked = assign_ranks(entities, 1);

            let ranks: Vec<u64> = ranked.iter().map(|r| r.rank).collect();
            prop_assert_eq!(ranks, (1..=n).collect::<Vec<_>>());

            for pair in ranked.windows(2) {
                prop_assert!(pair[0].entity.score >= pair[1].entity.score);
                prop_assert_ne!(compare(&pair[0].entity, &pair[1].entity), Ordering::Greater);
            }
        }

        /// Property: with distinct display keys the result is independent of input order.
        #[test]
        fn prop_order_independent_of_input(entities in population()) {
            let mut reversed = entities.clone();
            reversed.reverse();

            let forward: Vec<_> = assign_ranks(entities, 1).into_iter().map(|r| r.entity.id).collect();
            let backward: Vec<_> = assign_ranks(reversed, 1).into_iter().map(|r| r.entity.id).collect();
            prop_assert_eq!(forward, backward);
        }
    }
}
