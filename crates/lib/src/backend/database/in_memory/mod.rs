//! In-memory database backend implementation
//!
//! This module provides an in-memory implementation of the `BackendImpl`
//! trait, suitable for testing, development, or single-process deployments
//! that persist by saving the whole state to a JSON file.

mod persistence;
mod storage;
mod transaction;

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{BackendImpl, ScopeTransaction};
use crate::clock::{Clock, SystemClock};
use crate::entity::{Board, BoardId, Card, CardId, CardUpdate, List, ListId, Scope, UserId};

use storage::State;
use transaction::InMemoryTransaction;

/// A simple in-memory backend keeping boards, lists and cards in `HashMap`s.
///
/// Same-scope transactions are serialized by a per-scope async mutex; the
/// committed rows sit behind a single `RwLock` that is only held for the
/// duration of a read or of a commit.
///
/// It provides basic persistence via [`InMemory::save_to_file`] and
/// [`InMemory::load_from_file`], serializing the state to JSON.
#[derive(Debug)]
pub struct InMemory {
    pub(crate) state: Arc<RwLock<State>>,
    scope_locks: Mutex<HashMap<Scope, Arc<Mutex<()>>>>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl InMemory {
    /// Creates a new, empty `InMemory` backend using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a new, empty `InMemory` backend stamping rows with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::from_state(State::default(), clock)
    }

    fn from_state(state: State, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            scope_locks: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Saves the entire backend state to a JSON file.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_to_file(self, path).await
    }

    /// Loads the backend state from a JSON file written by `save_to_file`.
    ///
    /// Returns an error if the file does not exist or cannot be parsed; the
    /// caller decides whether to start fresh.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let state = persistence::load_from_file(path).await?;
        Ok(Self::from_state(state, Arc::new(SystemClock)))
    }

    /// Lock for one scope, shared by every transaction on that scope.
    async fn scope_lock(&self, scope: &Scope) -> Arc<Mutex<()>> {
        let mut locks = self.scope_locks.lock().await;
        // Drop locks nobody holds or waits on.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(*scope)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for InMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendImpl for InMemory {
    async fn begin_scope(&self, scope: &Scope) -> Result<Box<dyn ScopeTransaction>> {
        let guard = self.scope_lock(scope).await.lock_owned().await;

        let board_id = {
            let state = self.state.read().await;
            state
                .scope_board(scope)
                .ok_or(BackendError::ScopeNotFound { scope: *scope })?
        };

        Ok(Box::new(InMemoryTransaction::new(
            *scope,
            board_id,
            Arc::clone(&self.state),
            Arc::clone(&self.clock),
            guard,
        )))
    }

    async fn create_board(
        &self,
        name: &str,
        created_by: UserId,
        list_titles: &[&str],
    ) -> Result<Board> {
        storage::create_board(self, name, created_by, list_titles).await
    }

    async fn get_board(&self, id: &BoardId) -> Result<Board> {
        storage::get_board(self, id).await
    }

    async fn boards_for_user(&self, user_id: &UserId) -> Result<Vec<Board>> {
        storage::boards_for_user(self, user_id).await
    }

    async fn rename_board(&self, id: &BoardId, name: &str) -> Result<Board> {
        storage::rename_board(self, id, name).await
    }

    async fn delete_board(&self, id: &BoardId) -> Result<()> {
        storage::delete_board(self, id).await
    }

    async fn update_list(&self, id: &ListId, title: &str) -> Result<List> {
        storage::update_list(self, id, title).await
    }

    async fn update_card(&self, id: &CardId, update: &CardUpdate) -> Result<Card> {
        storage::update_card(self, id, update).await
    }

    async fn get_list(&self, id: &ListId) -> Result<List> {
        storage::get_list(self, id).await
    }

    async fn get_card(&self, id: &CardId) -> Result<Card> {
        storage::get_card(self, id).await
    }

    async fn lists_in_board(&self, board_id: &BoardId) -> Result<Vec<List>> {
        storage::lists_in_board(self, board_id).await
    }

    async fn cards_in_list(&self, list_id: &ListId) -> Result<Vec<Card>> {
        storage::cards_in_list(self, list_id).await
    }

    async fn delete_list(&self, id: &ListId) -> Result<()> {
        storage::delete_list(self, id).await
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        storage::delete_card(self, id).await
    }

    async fn add_member(&self, board_id: &BoardId, user_id: &UserId) -> Result<()> {
        storage::add_member(self, board_id, user_id).await
    }

    async fn is_member(&self, board_id: &BoardId, user_id: &UserId) -> Result<bool> {
        storage::is_member(self, board_id, user_id).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
