//! Whole-scope renumbering.

use uuid::Uuid;

use crate::Result;
use crate::backend::ScopeTransaction;
use crate::rank::{Rank, reindexed_ranks};

/// Renumber every member of the transaction's scope to `GAP, 2*GAP, ...`
/// in current display order.
///
/// Members already at their target rank are not rewritten. Returns the
/// number of members whose rank changed. Nothing is visible until the
/// transaction commits.
pub async fn reindex(txn: &mut dyn ScopeTransaction) -> Result<usize> {
    let siblings = txn.siblings_by_rank().await?;
    let updates: Vec<(Uuid, Rank)> = siblings
        .iter()
        .zip(reindexed_ranks(siblings.len()))
        .filter(|(entity, rank)| entity.rank() != *rank)
        .map(|(entity, rank)| (entity.id(), rank))
        .collect();

    if !updates.is_empty() {
        txn.bulk_update_ranks(&updates).await?;
    }

    tracing::info!(
        scope = %txn.scope(),
        siblings = siblings.len(),
        renumbered = updates.len(),
        "Reindexed scope"
    );
    Ok(updates.len())
}
