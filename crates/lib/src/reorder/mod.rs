//! Placing lists and cards within their ordering scope.
//!
//! [`Reorderer`] is the only entry point that writes ranks. Every operation
//! runs in a single [`ScopeTransaction`]:
//!
//! 1. resolve the target scope's board and authorize the actor against it,
//! 2. open the scope transaction and load the entity,
//! 3. validate the placement against the scope,
//! 4. compute a rank between the resolved neighbours, reindexing the scope
//!    and retrying once if the neighbours are adjacent,
//! 5. write the rank (and the new scope, if the entity changed parent) and
//!    commit.
//!
//! A failure at any step drops the transaction, leaving every rank as it was.

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::Result;
use crate::auth::Authorizer;
use crate::backend::{Backend, ScopeTransaction};
use crate::entity::{
    BoardId, CardId, Entity, EntityKind, ListId, NewCard, Scope, UserId,
};
use crate::rank::{Rank, rank_between};

mod errors;
mod reindex;

pub use errors::{ReorderError, TargetMismatch};
pub use reindex::reindex;

/// Where to put an entity within its scope.
///
/// `before` is the sibling that should directly precede the entity and
/// `after` the one that should directly follow it. A missing side means the
/// entity goes to that end of the scope. With neither given the entity is
/// appended after the current last sibling. An explicit `rank` is used as-is
/// and the neighbours are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    pub rank: Option<Rank>,
    pub before: Option<Uuid>,
    pub after: Option<Uuid>,
}

impl Placement {
    /// Append after the last sibling.
    pub fn tail() -> Self {
        Self::default()
    }

    /// Use `rank` verbatim.
    pub fn at(rank: Rank) -> Self {
        Self {
            rank: Some(rank),
            ..Self::default()
        }
    }

    /// Place between two siblings; `None` means the start or end of the scope.
    pub fn between(before: Option<Uuid>, after: Option<Uuid>) -> Self {
        Self {
            rank: None,
            before,
            after,
        }
    }

    fn is_tail(&self) -> bool {
        self.rank.is_none() && self.before.is_none() && self.after.is_none()
    }
}

/// Result of a successful create or move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    /// The entity as committed.
    pub entity: Entity,
    /// The rank it was given.
    pub rank: Rank,
    /// Whether the scope had to be reindexed first.
    pub reindexed: bool,
}

/// Orders lists within boards and cards within lists.
#[derive(Clone)]
pub struct Reorderer<A> {
    backend: Backend,
    authorizer: A,
}

impl<A: Authorizer> Reorderer<A> {
    pub fn new(backend: Backend, authorizer: A) -> Self {
        Self {
            backend,
            authorizer,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }

    /// Board that owns `scope`. Fails with a not-found error if the scope's
    /// parent does not exist.
    pub async fn scope_board(&self, scope: &Scope) -> Result<BoardId> {
        match scope {
            Scope::Board(id) => Ok(self.backend.get_board(id).await?.id),
            Scope::List(id) => Ok(self.backend.get_list(id).await?.board_id),
        }
    }

    /// Move a list within its board.
    pub async fn move_list(
        &self,
        actor: &UserId,
        list_id: ListId,
        board_id: BoardId,
        placement: Placement,
    ) -> Result<MoveOutcome> {
        self.move_entity(
            actor,
            EntityKind::List,
            list_id,
            Scope::Board(board_id),
            placement,
        )
        .await
    }

    /// Move a card within its list or to another list of the same board.
    pub async fn move_card(
        &self,
        actor: &UserId,
        card_id: CardId,
        list_id: ListId,
        placement: Placement,
    ) -> Result<MoveOutcome> {
        self.move_entity(
            actor,
            EntityKind::Card,
            card_id,
            Scope::List(list_id),
            placement,
        )
        .await
    }

    /// Move an entity of `kind` into `target` at `placement`.
    #[instrument(skip(self, placement), fields(scope = %target))]
    pub async fn move_entity(
        &self,
        actor: &UserId,
        kind: EntityKind,
        id: Uuid,
        target: Scope,
        placement: Placement,
    ) -> Result<MoveOutcome> {
        if target.member_kind() != kind {
            return Err(TargetMismatch::WrongScopeKind {
                kind,
                scope: target,
            }
            .into());
        }

        let mut txn = self.open(actor, &target).await?;
        let entity = txn.get_entity(kind, id).await?;

        if entity.board_id() != txn.board_id() {
            let (from, to) = (entity.board_id(), txn.board_id());
            let mismatch = match kind {
                EntityKind::List => TargetMismatch::CrossBoardList {
                    list_id: id,
                    from,
                    to,
                },
                EntityKind::Card => TargetMismatch::CrossBoardCard {
                    card_id: id,
                    from,
                    to,
                },
            };
            return Err(mismatch.into());
        }

        let (rank, reindexed) = place(txn.as_mut(), Some(id), &placement).await?;
        let new_scope = (entity.scope() != target).then_some(&target);
        let entity = txn.update_rank(kind, id, rank, new_scope).await?;
        txn.commit().await?;

        tracing::debug!(%id, rank, reindexed, reparented = new_scope.is_some(), "Moved {kind}");
        Ok(MoveOutcome {
            entity,
            rank,
            reindexed,
        })
    }

    /// Create a list in `board_id` at `placement`.
    #[instrument(skip(self, title, placement))]
    pub async fn create_list(
        &self,
        actor: &UserId,
        board_id: BoardId,
        title: &str,
        placement: Placement,
    ) -> Result<MoveOutcome> {
        let mut txn = self.open(actor, &Scope::Board(board_id)).await?;
        let (rank, reindexed) = place(txn.as_mut(), None, &placement).await?;
        let list = txn.insert_list(title, rank).await?;
        txn.commit().await?;

        tracing::debug!(id = %list.id, rank, reindexed, "Created list");
        Ok(MoveOutcome {
            entity: list.into(),
            rank,
            reindexed,
        })
    }

    /// Create a card in `list_id` at `placement`.
    #[instrument(skip(self, card, placement))]
    pub async fn create_card(
        &self,
        actor: &UserId,
        list_id: ListId,
        card: &NewCard,
        placement: Placement,
    ) -> Result<MoveOutcome> {
        let mut txn = self.open(actor, &Scope::List(list_id)).await?;
        let (rank, reindexed) = place(txn.as_mut(), None, &placement).await?;
        let card = txn.insert_card(card, rank).await?;
        txn.commit().await?;

        tracing::debug!(id = %card.id, rank, reindexed, "Created card");
        Ok(MoveOutcome {
            entity: card.into(),
            rank,
            reindexed,
        })
    }

    /// Renumber a whole scope to `GAP, 2*GAP, ...`. Returns how many members
    /// changed rank.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn reindex_scope(&self, actor: &UserId, scope: Scope) -> Result<usize> {
        let mut txn = self.open(actor, &scope).await?;
        let renumbered = reindex(txn.as_mut()).await?;
        txn.commit().await?;
        Ok(renumbered)
    }

    /// Authorize `actor` on the scope's board, then open the scope.
    ///
    /// Authorization happens first so the authorizer's own reads never wait
    /// behind the scope lock.
    async fn open(&self, actor: &UserId, scope: &Scope) -> Result<Box<dyn ScopeTransaction>> {
        let board_id = self.scope_board(scope).await?;
        self.authorizer.authorize(actor, &board_id).await?;
        self.backend.begin_scope(scope).await
    }
}

/// Compute the rank for `placement`, reindexing the scope once if the
/// neighbours leave no room.
async fn place(
    txn: &mut dyn ScopeTransaction,
    moving: Option<Uuid>,
    placement: &Placement,
) -> Result<(Rank, bool)> {
    if let Some(rank) = placement.rank {
        tracing::debug!(rank, "Using explicit rank");
        return Ok((rank, false));
    }

    let (before, after) = neighbor_ranks(txn, moving, placement).await?;
    if let Some(rank) = rank_between(before, after) {
        tracing::debug!(?before, ?after, rank, "Computed rank");
        return Ok((rank, false));
    }

    tracing::info!(scope = %txn.scope(), ?before, ?after, "No room between neighbours, reindexing");
    reindex(txn).await?;

    let (before, after) = neighbor_ranks(txn, moving, placement).await?;
    match rank_between(before, after) {
        Some(rank) => {
            tracing::debug!(?before, ?after, rank, "Computed rank after reindex");
            Ok((rank, true))
        }
        None => {
            tracing::error!(scope = %txn.scope(), ?before, ?after, "Ranking exhausted after reindex");
            Err(ReorderError::RankingExhausted {
                scope: *txn.scope(),
                before,
                after,
            }
            .into())
        }
    }
}

/// Current ranks of the placement's neighbours.
async fn neighbor_ranks(
    txn: &mut dyn ScopeTransaction,
    moving: Option<Uuid>,
    placement: &Placement,
) -> Result<(Option<Rank>, Option<Rank>)> {
    if placement.is_tail() {
        let last = txn
            .siblings_by_rank()
            .await?
            .into_iter()
            .filter(|sibling| Some(sibling.id()) != moving)
            .next_back();
        return Ok((last.map(|sibling| sibling.rank()), None));
    }

    if let (Some(before), Some(after)) = (placement.before, placement.after)
        && before == after
    {
        return Err(TargetMismatch::SameNeighbor { id: before }.into());
    }

    let before = match placement.before {
        Some(id) => neighbor(txn, moving, id).await?,
        None => None,
    };
    let after = match placement.after {
        Some(id) => neighbor(txn, moving, id).await?,
        None => None,
    };

    if let (Some(before), Some(after)) = (&before, &after)
        && before.rank() > after.rank()
    {
        return Err(TargetMismatch::InvertedNeighbors {
            before: before.id(),
            before_rank: before.rank(),
            after: after.id(),
            after_rank: after.rank(),
        }
        .into());
    }

    Ok((
        before.map(|entity| entity.rank()),
        after.map(|entity| entity.rank()),
    ))
}

/// Load a neighbour and check it is a member of the transaction's scope.
///
/// A neighbour that no longer exists resolves to `None`, i.e. that end of
/// the scope.
async fn neighbor(
    txn: &mut dyn ScopeTransaction,
    moving: Option<Uuid>,
    id: Uuid,
) -> Result<Option<Entity>> {
    if moving == Some(id) {
        return Err(TargetMismatch::SelfNeighbor { id }.into());
    }

    let kind = txn.scope().member_kind();
    let entity = match txn.get_entity(kind, id).await {
        Ok(entity) => entity,
        Err(err) if err.is_not_found() => {
            let other = match kind {
                EntityKind::List => EntityKind::Card,
                EntityKind::Card => EntityKind::List,
            };
            return match txn.get_entity(other, id).await {
                Ok(_) => Err(TargetMismatch::NeighborWrongKind { kind, id }.into()),
                Err(err) if err.is_not_found() => {
                    tracing::debug!(%id, "Neighbour is gone, using the end of the scope");
                    Ok(None)
                }
                Err(err) => Err(err),
            };
        }
        Err(err) => return Err(err),
    };

    if entity.scope() != *txn.scope() {
        return Err(TargetMismatch::NeighborOutOfScope {
            id,
            scope: *txn.scope(),
        }
        .into());
    }
    Ok(Some(entity))
}
