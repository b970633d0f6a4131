//! Error types for ordering operations.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::entity::{BoardId, EntityKind, Scope, UserId};
use crate::rank::Rank;

/// Why a requested placement does not fit the target scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetMismatch {
    /// The scope orders a different kind of entity.
    WrongScopeKind { kind: EntityKind, scope: Scope },
    /// Lists cannot move to another board.
    CrossBoardList {
        list_id: Uuid,
        from: BoardId,
        to: BoardId,
    },
    /// Cards can only move to lists on their own board.
    CrossBoardCard {
        card_id: Uuid,
        from: BoardId,
        to: BoardId,
    },
    /// The neighbor id names an entity of another kind than `kind`.
    NeighborWrongKind { kind: EntityKind, id: Uuid },
    /// The neighbor exists but is ordered in another scope.
    NeighborOutOfScope { id: Uuid, scope: Scope },
    /// The moved entity was named as its own neighbor.
    SelfNeighbor { id: Uuid },
    /// The same entity was named as both `before` and `after`.
    SameNeighbor { id: Uuid },
    /// `before` currently ranks after `after`.
    InvertedNeighbors {
        before: Uuid,
        before_rank: Rank,
        after: Uuid,
        after_rank: Rank,
    },
}

impl fmt::Display for TargetMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMismatch::WrongScopeKind { kind, scope } => {
                write!(f, "{scope} does not order {kind}s")
            }
            TargetMismatch::CrossBoardList { list_id, from, to } => {
                write!(f, "list {list_id} belongs to board {from}, not {to}")
            }
            TargetMismatch::CrossBoardCard { card_id, from, to } => {
                write!(f, "card {card_id} belongs to board {from}, not {to}")
            }
            TargetMismatch::NeighborWrongKind { kind, id } => {
                write!(f, "neighbor {id} is not a {kind}")
            }
            TargetMismatch::NeighborOutOfScope { id, scope } => {
                write!(f, "neighbor {id} is not in {scope}")
            }
            TargetMismatch::SelfNeighbor { id } => write!(f, "{id} cannot be its own neighbor"),
            TargetMismatch::SameNeighbor { id } => {
                write!(f, "{id} cannot be both the preceding and following neighbor")
            }
            TargetMismatch::InvertedNeighbors {
                before,
                before_rank,
                after,
                after_rank,
            } => write!(
                f,
                "neighbor {before} (rank {before_rank}) does not precede {after} (rank {after_rank})"
            ),
        }
    }
}

/// Errors raised by the reorder orchestrator.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReorderError {
    /// The actor may not act on the board.
    #[error("Access denied: user {actor} on board {board_id}")]
    AccessDenied {
        /// The acting user
        actor: UserId,
        /// The board the actor tried to act on
        board_id: BoardId,
    },

    /// The requested placement does not fit the target scope.
    #[error("Invalid target: {reason}")]
    InvalidTarget {
        /// What was wrong with the placement
        reason: TargetMismatch,
    },

    /// No rank fits between the neighbors even after reindexing the scope.
    #[error("Ranking exhausted in {scope} between {before:?} and {after:?}")]
    RankingExhausted {
        /// The scope that ran out of rank space
        scope: Scope,
        /// Rank of the preceding neighbor after reindexing
        before: Option<Rank>,
        /// Rank of the following neighbor after reindexing
        after: Option<Rank>,
    },
}

impl ReorderError {
    /// Check if the actor was refused access.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ReorderError::AccessDenied { .. })
    }

    /// Check if the placement was malformed.
    pub fn is_invalid_target(&self) -> bool {
        matches!(self, ReorderError::InvalidTarget { .. })
    }

    /// Check if the scope ran out of rank space.
    pub fn is_ranking_exhausted(&self) -> bool {
        matches!(self, ReorderError::RankingExhausted { .. })
    }

    /// The target mismatch, if this is an `InvalidTarget` error.
    pub fn target_mismatch(&self) -> Option<&TargetMismatch> {
        match self {
            ReorderError::InvalidTarget { reason } => Some(reason),
            _ => None,
        }
    }
}

impl From<TargetMismatch> for ReorderError {
    fn from(reason: TargetMismatch) -> Self {
        ReorderError::InvalidTarget { reason }
    }
}

impl From<ReorderError> for crate::Error {
    fn from(err: ReorderError) -> Self {
        crate::Error::Reorder(err)
    }
}

impl From<TargetMismatch> for crate::Error {
    fn from(reason: TargetMismatch) -> Self {
        crate::Error::Reorder(reason.into())
    }
}
