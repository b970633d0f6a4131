//! Storage error types.
//!
//! Structured errors for backend operations, shared by the in-memory and SQL
//! backends.

use thiserror::Error;
use uuid::Uuid;

use crate::entity::{BoardId, CardId, EntityKind, ListId, Scope};

/// Errors that can occur during storage operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// Board not found by ID.
    #[error("Board not found: {id}")]
    BoardNotFound {
        /// The ID of the board that was not found
        id: BoardId,
    },

    /// List not found by ID.
    #[error("List not found: {id}")]
    ListNotFound {
        /// The ID of the list that was not found
        id: ListId,
    },

    /// Card not found by ID.
    #[error("Card not found: {id}")]
    CardNotFound {
        /// The ID of the card that was not found
        id: CardId,
    },

    /// The parent of an ordering scope does not exist.
    #[error("Scope not found: {scope}")]
    ScopeNotFound {
        /// The scope whose parent is missing
        scope: Scope,
    },

    /// SQL backend error.
    #[error("SQL error: {reason}")]
    SqlxError {
        /// Description including context
        reason: String,
        /// The underlying sqlx error, if any
        #[cfg(any(feature = "sqlite", feature = "postgres"))]
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A row changed underneath an open transaction.
    #[error("Write conflict on {kind} {id}")]
    WriteConflict {
        /// Kind of the conflicting row
        kind: EntityKind,
        /// ID of the conflicting row
        id: Uuid,
    },

    /// Stored data violates an invariant the backend relies on.
    #[error("Storage state inconsistency: {reason}")]
    StateInconsistency {
        /// Description of the inconsistency
        reason: String,
    },
}

impl BackendError {
    /// Not-found error for an entity of the given kind.
    pub fn entity_not_found(kind: EntityKind, id: Uuid) -> Self {
        match kind {
            EntityKind::List => BackendError::ListNotFound { id },
            EntityKind::Card => BackendError::CardNotFound { id },
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BackendError::BoardNotFound { .. }
                | BackendError::ListNotFound { .. }
                | BackendError::CardNotFound { .. }
                | BackendError::ScopeNotFound { .. }
        )
    }

    /// Check if this error is related to I/O operations.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            BackendError::FileIo { .. }
                | BackendError::SerializationFailed { .. }
                | BackendError::DeserializationFailed { .. }
        )
    }

    /// Check if this error came from the SQL driver.
    pub fn is_sql_error(&self) -> bool {
        matches!(self, BackendError::SqlxError { .. })
    }

    /// Check if this error is a concurrent modification of the same row.
    pub fn is_conflict(&self) -> bool {
        matches!(self, BackendError::WriteConflict { .. })
    }

    /// Check if this error indicates a data integrity issue.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, BackendError::StateInconsistency { .. })
    }

    /// Get the entity ID if this error is about a specific row.
    pub fn entity_id(&self) -> Option<Uuid> {
        match self {
            BackendError::BoardNotFound { id }
            | BackendError::ListNotFound { id }
            | BackendError::CardNotFound { id }
            | BackendError::WriteConflict { id, .. } => Some(*id),
            BackendError::ScopeNotFound { scope } => Some(scope.parent_id()),
            _ => None,
        }
    }
}

impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
