//! Storage backends for boards, lists and cards.
//!
//! [`BackendImpl`] is the storage contract the ranking core depends on. Plain
//! lookups and creation of boards live directly on the trait; everything that
//! reads or writes ranks goes through a [`ScopeTransaction`] opened with
//! [`BackendImpl::begin_scope`].
//!
//! ## Scope transactions
//!
//! A scope transaction is the unit of serialization for an ordering scope. An
//! implementation must guarantee that, between `begin_scope` and `commit`, no
//! other transaction on the same scope reads or writes that scope's ranks,
//! and that nothing written through the transaction becomes visible unless
//! `commit` succeeds. Dropping an uncommitted transaction rolls it back.
//! Transactions on different scopes must not block each other longer than a
//! single storage write.
//!
//! Opening a scope transaction also bumps the scope parent's `version` and
//! `updated_at`.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use handle_trait::Handle;
use uuid::Uuid;

use crate::Result;
use crate::entity::{
    Board, BoardId, Card, CardId, CardUpdate, DEFAULT_LIST_TITLES, Entity, EntityKind, List,
    ListId, NewCard, Scope, UserId,
};
use crate::rank::Rank;

pub mod database;
pub mod errors;

pub use errors::BackendError;

/// An open, exclusive transaction over one ordering scope.
///
/// All reads observe the transaction's own uncommitted writes.
#[async_trait]
pub trait ScopeTransaction: Send {
    /// The scope this transaction serializes.
    fn scope(&self) -> &Scope;

    /// The board the scope belongs to (the board itself for `Scope::Board`).
    fn board_id(&self) -> BoardId;

    /// Read a single entity of any scope.
    ///
    /// Returns a not-found error if no entity of `kind` has that id.
    async fn get_entity(&mut self, kind: EntityKind, id: Uuid) -> Result<Entity>;

    /// All members of this scope, ascending by rank, ties broken by creation
    /// time and then id.
    async fn siblings_by_rank(&mut self) -> Result<Vec<Entity>>;

    /// Set the rank of one entity, optionally moving it into `new_scope`.
    ///
    /// Bumps the entity's `version` and `updated_at` and returns the new row.
    async fn update_rank(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        rank: Rank,
        new_scope: Option<&Scope>,
    ) -> Result<Entity>;

    /// Set many ranks within this scope. Applied all-or-nothing at commit.
    async fn bulk_update_ranks(&mut self, updates: &[(Uuid, Rank)]) -> Result<()>;

    /// Insert a list into this (board) scope.
    async fn insert_list(&mut self, title: &str, rank: Rank) -> Result<List>;

    /// Insert a card into this (list) scope.
    async fn insert_card(&mut self, card: &NewCard, rank: Rank) -> Result<Card>;

    /// Make every write of this transaction visible atomically.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Storage contract for the ranking core.
///
/// All backend implementations must be `Send` and `Sync` to allow sharing
/// across request handlers, and implement `Any` to allow downcasting (used to
/// persist the in-memory backend on shutdown).
#[async_trait]
pub trait BackendImpl: Send + Sync + Any {
    /// Open an exclusive transaction on `scope`.
    ///
    /// Fails with [`BackendError::ScopeNotFound`] if the scope's parent does
    /// not exist.
    async fn begin_scope(&self, scope: &Scope) -> Result<Box<dyn ScopeTransaction>>;

    /// Create a new board owned by `created_by`, atomically seeded with one
    /// list per title ranked `GAP, 2*GAP, ...`. The creator becomes a member.
    async fn create_board(
        &self,
        name: &str,
        created_by: UserId,
        list_titles: &[&str],
    ) -> Result<Board>;

    async fn get_board(&self, id: &BoardId) -> Result<Board>;

    /// Boards `user_id` created or is a member of, most recently updated first.
    async fn boards_for_user(&self, user_id: &UserId) -> Result<Vec<Board>>;

    /// Rename a board, bumping its `version` and `updated_at`.
    async fn rename_board(&self, id: &BoardId, name: &str) -> Result<Board>;

    /// Delete a board with its lists, cards and memberships.
    async fn delete_board(&self, id: &BoardId) -> Result<()>;

    /// Change a list's title. The rank is untouched.
    async fn update_list(&self, id: &ListId, title: &str) -> Result<List>;

    /// Change a card's title and/or description. The rank is untouched.
    async fn update_card(&self, id: &CardId, update: &CardUpdate) -> Result<Card>;

    async fn get_list(&self, id: &ListId) -> Result<List>;

    async fn get_card(&self, id: &CardId) -> Result<Card>;

    /// Lists of a board in display order.
    async fn lists_in_board(&self, board_id: &BoardId) -> Result<Vec<List>>;

    /// Cards of a list in display order.
    async fn cards_in_list(&self, list_id: &ListId) -> Result<Vec<Card>>;

    /// Delete a list and its cards. Sibling ranks are left untouched.
    async fn delete_list(&self, id: &ListId) -> Result<()>;

    /// Delete a card. Sibling ranks are left untouched.
    async fn delete_card(&self, id: &CardId) -> Result<()>;

    /// Grant `user_id` membership of a board. Idempotent.
    async fn add_member(&self, board_id: &BoardId, user_id: &UserId) -> Result<()>;

    /// Whether `user_id` holds a membership of the board.
    async fn is_member(&self, board_id: &BoardId, user_id: &UserId) -> Result<bool>;

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Cheaply cloneable handle to a storage backend.
#[derive(Clone, Handle)]
pub struct Backend {
    backend_impl: Arc<dyn BackendImpl>,
}

impl Backend {
    pub fn new(backend_impl: Arc<dyn BackendImpl>) -> Self {
        Self { backend_impl }
    }

    /// Access the underlying implementation, e.g. to downcast it.
    pub fn backend_impl(&self) -> &dyn BackendImpl {
        self.backend_impl.as_ref()
    }

    pub async fn begin_scope(&self, scope: &Scope) -> Result<Box<dyn ScopeTransaction>> {
        self.backend_impl.begin_scope(scope).await
    }

    /// Create a board with the default "To Do", "Doing" and "Done" lists.
    pub async fn create_board(&self, name: &str, created_by: UserId) -> Result<Board> {
        self.backend_impl
            .create_board(name, created_by, &DEFAULT_LIST_TITLES)
            .await
    }

    /// Create a board without any lists.
    pub async fn create_empty_board(&self, name: &str, created_by: UserId) -> Result<Board> {
        self.backend_impl.create_board(name, created_by, &[]).await
    }

    pub async fn get_board(&self, id: &BoardId) -> Result<Board> {
        self.backend_impl.get_board(id).await
    }

    pub async fn boards_for_user(&self, user_id: &UserId) -> Result<Vec<Board>> {
        self.backend_impl.boards_for_user(user_id).await
    }

    pub async fn rename_board(&self, id: &BoardId, name: &str) -> Result<Board> {
        self.backend_impl.rename_board(id, name).await
    }

    pub async fn delete_board(&self, id: &BoardId) -> Result<()> {
        self.backend_impl.delete_board(id).await
    }

    pub async fn update_list(&self, id: &ListId, title: &str) -> Result<List> {
        self.backend_impl.update_list(id, title).await
    }

    pub async fn update_card(&self, id: &CardId, update: &CardUpdate) -> Result<Card> {
        self.backend_impl.update_card(id, update).await
    }

    pub async fn get_list(&self, id: &ListId) -> Result<List> {
        self.backend_impl.get_list(id).await
    }

    pub async fn get_card(&self, id: &CardId) -> Result<Card> {
        self.backend_impl.get_card(id).await
    }

    pub async fn lists_in_board(&self, board_id: &BoardId) -> Result<Vec<List>> {
        self.backend_impl.lists_in_board(board_id).await
    }

    pub async fn cards_in_list(&self, list_id: &ListId) -> Result<Vec<Card>> {
        self.backend_impl.cards_in_list(list_id).await
    }

    pub async fn delete_list(&self, id: &ListId) -> Result<()> {
        self.backend_impl.delete_list(id).await
    }

    pub async fn delete_card(&self, id: &CardId) -> Result<()> {
        self.backend_impl.delete_card(id).await
    }

    pub async fn add_member(&self, board_id: &BoardId, user_id: &UserId) -> Result<()> {
        self.backend_impl.add_member(board_id, user_id).await
    }

    pub async fn is_member(&self, board_id: &BoardId, user_id: &UserId) -> Result<bool> {
        self.backend_impl.is_member(board_id, user_id).await
    }
}

impl From<Arc<dyn BackendImpl>> for Backend {
    fn from(backend_impl: Arc<dyn BackendImpl>) -> Self {
        Self::new(backend_impl)
    }
}

impl From<Box<dyn BackendImpl>> for Backend {
    fn from(backend_impl: Box<dyn BackendImpl>) -> Self {
        Self::new(Arc::from(backend_impl))
    }
}
