//!
//! kanban-rank: ordering core for kanban boards.
//! This library keeps the lists of a board and the cards of a list in a stable, user-chosen order.
//!
//! ## Core Concepts
//!
//! * **Ranks (`rank::Rank`)**: Sparse integers spaced by `rank::RANK_GAP`. Ascending rank is display order.
//! * **Scopes (`entity::Scope`)**: The set of siblings that share an ordering: the lists of one board, or the cards of one list.
//! * **Backends (`backend::Backend`)**: A pluggable storage layer. Every rank write happens inside a per-scope transaction (`backend::ScopeTransaction`).
//! * **Reorderer (`reorder::Reorderer`)**: Places new and moved entities between their neighbors, renumbering the whole scope when the gap between two neighbors is used up.
//! * **Authorizers (`auth::Authorizer`)**: Decide whether an actor may reorder within a board.

pub mod auth;
pub mod backend;
pub mod clock;
pub mod entity;
pub mod rank;
pub mod reorder;

pub use auth::{AllowAll, Authorizer, BoardAccess};
pub use backend::Backend;
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use entity::{Board, Card, CardUpdate, Entity, EntityKind, List, NewCard, Scope};
pub use rank::{RANK_GAP, Rank};
pub use reorder::{MoveOutcome, Placement, Reorderer};

/// Result type used throughout the kanban-rank library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the kanban-rank library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured storage errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Structured ordering errors from the reorder module
    #[error(transparent)]
    Reorder(reorder::ReorderError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Backend(_) => "backend",
            Error::Reorder(_) => "reorder",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a board, list, card or scope was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if the actor was not allowed to act on the board.
    pub fn is_access_denied(&self) -> bool {
        match self {
            Error::Reorder(reorder_err) => reorder_err.is_access_denied(),
            _ => false,
        }
    }

    /// Check if the requested placement was malformed.
    pub fn is_invalid_target(&self) -> bool {
        match self {
            Error::Reorder(reorder_err) => reorder_err.is_invalid_target(),
            _ => false,
        }
    }

    /// Check if a scope ran out of rank space even after reindexing.
    pub fn is_ranking_exhausted(&self) -> bool {
        match self {
            Error::Reorder(reorder_err) => reorder_err.is_ranking_exhausted(),
            _ => false,
        }
    }

    /// Check if a concurrent transaction moved a row this one wrote.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is database/backend-related.
    pub fn is_database_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Check if this error indicates a data integrity issue.
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_integrity_error(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(backend_err) => backend_err.is_io_error(),
            _ => false,
        }
    }
}
