//! Integer rank arithmetic.
//!
//! Siblings inside an ordering scope are sorted by an `i64` rank. New or moved
//! entities get a rank computed from their neighbours so that no other sibling
//! has to be rewritten. When two neighbours are adjacent integers there is no
//! room left between them; [`rank_between`] then returns `None` and the caller
//! has to renumber the whole scope (see [`crate::reorder::reindex`]).
//!
//! ```
//! use kanban_rank::rank::{RANK_GAP, rank_between};
//!
//! assert_eq!(rank_between(None, None), Some(RANK_GAP));
//! assert_eq!(rank_between(Some(1000), Some(3000)), Some(2000));
//! assert_eq!(rank_between(Some(1000), Some(1001)), None);
//! ```

/// Rank value of a list within its board, or of a card within its list.
pub type Rank = i64;

/// Spacing used for the first entity, for tail appends and after a reindex.
pub const RANK_GAP: Rank = 1000;

/// Rank given to the first entity of an empty scope.
pub fn rank_initial() -> Rank {
    RANK_GAP
}

/// Compute a rank strictly between `before` and `after`.
///
/// `before` is the rank of the sibling that will precede the entity and
/// `after` the rank of the sibling that will follow it; `None` means there is
/// no such sibling.
///
/// Returns `None` when no integer fits, which is the signal to reindex. When
/// both bounds are present the midpoint is floored, so rounding error always
/// lands on the `before` side.
pub fn rank_between(before: Option<Rank>, after: Option<Rank>) -> Option<Rank> {
    match (before, after) {
        (None, None) => Some(rank_initial()),
        (None, Some(after)) => {
            let rank = after.div_euclid(2);
            (rank > 0).then_some(rank)
        }
        (Some(before), None) => (before < Rank::MAX).then(|| before.saturating_add(RANK_GAP)),
        (Some(before), Some(after)) => {
            let diff = (after as i128) - (before as i128);
            if diff <= 1 {
                return None;
            }
            Some((before as i128 + diff.div_euclid(2)) as Rank)
        }
    }
}

/// Ranks assigned by a reindex of `count` siblings: `GAP, 2*GAP, ..., count*GAP`.
pub fn reindexed_ranks(count: usize) -> impl Iterator<Item = Rank> {
    (1..=count as Rank).map(|position| position * RANK_GAP)
}
