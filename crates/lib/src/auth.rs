//! Access control for ordering operations.
//!
//! The ranking core never decides who may act on a board; it asks an
//! [`Authorizer`] before opening a scope transaction.

use async_trait::async_trait;

use crate::Result;
use crate::backend::Backend;
use crate::entity::{BoardId, UserId};
use crate::reorder::ReorderError;

/// Decides whether `actor` may create, move or reindex within a board.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(())` if allowed, [`ReorderError::AccessDenied`] if not.
    ///
    /// Any other error (e.g. the board does not exist) is propagated as-is.
    async fn authorize(&self, actor: &UserId, board_id: &BoardId) -> Result<()>;

    /// Like [`Authorizer::authorize`], for actions reserved to the board's
    /// owner such as deleting it. Defaults to the ordinary check.
    async fn authorize_owner(&self, actor: &UserId, board_id: &BoardId) -> Result<()> {
        self.authorize(actor, board_id).await
    }
}

/// Authorizer that allows every actor on every board.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _actor: &UserId, _board_id: &BoardId) -> Result<()> {
        Ok(())
    }
}

/// Membership-based authorizer: the board's creator and its members may act.
/// Only the creator passes [`Authorizer::authorize_owner`].
#[derive(Clone)]
pub struct BoardAccess {
    backend: Backend,
}

impl BoardAccess {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Authorizer for BoardAccess {
    async fn authorize(&self, actor: &UserId, board_id: &BoardId) -> Result<()> {
        let board = self.backend.get_board(board_id).await?;
        if board.created_by == *actor || self.backend.is_member(board_id, actor).await? {
            return Ok(());
        }

        tracing::debug!(%actor, board = %board_id, "Access denied");
        Err(denied(actor, board_id))
    }

    async fn authorize_owner(&self, actor: &UserId, board_id: &BoardId) -> Result<()> {
        let board = self.backend.get_board(board_id).await?;
        if board.created_by == *actor {
            return Ok(());
        }

        tracing::debug!(%actor, board = %board_id, "Owner access denied");
        Err(denied(actor, board_id))
    }
}

fn denied(actor: &UserId, board_id: &BoardId) -> crate::Error {
    ReorderError::AccessDenied {
        actor: *actor,
        board_id: *board_id,
    }
    .into()
}
