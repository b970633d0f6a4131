//! Row storage for the InMemory backend.
//!
//! [`State`] is the committed data set. Reads outside a scope transaction go
//! straight to it; transactions stage rows and apply them here on commit.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::InMemory;
use crate::{
    Result,
    backend::errors::BackendError,
    clock::Timestamp,
    entity::{
        Board, BoardId, Card, CardId, CardUpdate, Entity, List, ListId, Scope, UserId, sort_by_rank,
    },
    rank::reindexed_ranks,
};

/// Committed rows of the in-memory backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct State {
    pub(crate) boards: HashMap<BoardId, Board>,
    pub(crate) lists: HashMap<ListId, List>,
    pub(crate) cards: HashMap<CardId, Card>,
    /// Board memberships. Sorted sets keep the persisted file stable.
    #[serde(default)]
    pub(crate) members: HashMap<BoardId, BTreeSet<UserId>>,
}

impl State {
    /// Whether the parent row of `scope` exists.
    pub(crate) fn scope_exists(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Board(id) => self.boards.contains_key(id),
            Scope::List(id) => self.lists.contains_key(id),
        }
    }

    /// Board that owns `scope`, if the scope's parent exists.
    pub(crate) fn scope_board(&self, scope: &Scope) -> Option<BoardId> {
        match scope {
            Scope::Board(id) => self.boards.get(id).map(|board| board.id),
            Scope::List(id) => self.lists.get(id).map(|list| list.board_id),
        }
    }

    /// Bump `version` and `updated_at` of the scope's parent row.
    pub(crate) fn touch_scope(&mut self, scope: &Scope, now: Timestamp) -> Result<()> {
        match scope {
            Scope::Board(id) => {
                let board = self
                    .boards
                    .get_mut(id)
                    .ok_or(BackendError::ScopeNotFound { scope: *scope })?;
                board.version += 1;
                board.updated_at = now;
            }
            Scope::List(id) => {
                let list = self
                    .lists
                    .get_mut(id)
                    .ok_or(BackendError::ScopeNotFound { scope: *scope })?;
                list.version += 1;
                list.updated_at = now;
            }
        }
        Ok(())
    }

    /// Committed members of `scope`, unsorted.
    pub(crate) fn members_of(&self, scope: &Scope) -> Vec<Entity> {
        match scope {
            Scope::Board(board_id) => self
                .lists
                .values()
                .filter(|list| list.board_id == *board_id)
                .cloned()
                .map(Entity::List)
                .collect(),
            Scope::List(list_id) => self
                .cards
                .values()
                .filter(|card| card.list_id == *list_id)
                .cloned()
                .map(Entity::Card)
                .collect(),
        }
    }

    /// Remove a list together with its cards.
    pub(crate) fn remove_list(&mut self, id: &ListId) -> Result<()> {
        self.lists
            .remove(id)
            .ok_or(BackendError::ListNotFound { id: *id })?;
        self.cards.retain(|_, card| card.list_id != *id);
        Ok(())
    }

    /// Remove a board together with everything it owns.
    pub(crate) fn remove_board(&mut self, id: &BoardId) -> Result<()> {
        self.boards
            .remove(id)
            .ok_or(BackendError::BoardNotFound { id: *id })?;
        self.lists.retain(|_, list| list.board_id != *id);
        self.cards.retain(|_, card| card.board_id != *id);
        self.members.remove(id);
        Ok(())
    }

    fn can_see(&self, board: &Board, user_id: &UserId) -> bool {
        board.created_by == *user_id
            || self
                .members
                .get(&board.id)
                .is_some_and(|members| members.contains(user_id))
    }
}

pub(crate) async fn create_board(
    backend: &InMemory,
    name: &str,
    created_by: UserId,
    list_titles: &[&str],
) -> Result<Board> {
    let now = backend.clock.now_millis();
    let board = Board {
        id: uuid::Uuid::new_v4(),
        name: name.to_string(),
        created_by,
        created_at: now,
        updated_at: now,
        version: 1,
    };
    let lists = list_titles
        .iter()
        .zip(reindexed_ranks(list_titles.len()))
        .map(|(title, rank)| List {
            id: uuid::Uuid::new_v4(),
            board_id: board.id,
            title: title.to_string(),
            rank,
            created_at: now,
            updated_at: now,
            version: 1,
        });

    let mut state = backend.state.write().await;
    state.lists.extend(lists.map(|list| (list.id, list)));
    state.members.entry(board.id).or_default().insert(created_by);
    state.boards.insert(board.id, board.clone());
    Ok(board)
}

pub(crate) async fn get_board(backend: &InMemory, id: &BoardId) -> Result<Board> {
    let state = backend.state.read().await;
    state
        .boards
        .get(id)
        .cloned()
        .ok_or_else(|| BackendError::BoardNotFound { id: *id }.into())
}

pub(crate) async fn get_list(backend: &InMemory, id: &ListId) -> Result<List> {
    let state = backend.state.read().await;
    state
        .lists
        .get(id)
        .cloned()
        .ok_or_else(|| BackendError::ListNotFound { id: *id }.into())
}

pub(crate) async fn get_card(backend: &InMemory, id: &CardId) -> Result<Card> {
    let state = backend.state.read().await;
    state
        .cards
        .get(id)
        .cloned()
        .ok_or_else(|| BackendError::CardNotFound { id: *id }.into())
}

pub(crate) async fn boards_for_user(backend: &InMemory, user_id: &UserId) -> Result<Vec<Board>> {
    let state = backend.state.read().await;
    let mut boards: Vec<Board> = state
        .boards
        .values()
        .filter(|board| state.can_see(board, user_id))
        .cloned()
        .collect();
    boards.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
    Ok(boards)
}

pub(crate) async fn rename_board(backend: &InMemory, id: &BoardId, name: &str) -> Result<Board> {
    let now = backend.clock.now_millis();
    let mut state = backend.state.write().await;
    let board = state
        .boards
        .get_mut(id)
        .ok_or(BackendError::BoardNotFound { id: *id })?;
    board.name = name.to_string();
    board.version += 1;
    board.updated_at = now;
    Ok(board.clone())
}

pub(crate) async fn delete_board(backend: &InMemory, id: &BoardId) -> Result<()> {
    let mut state = backend.state.write().await;
    state.remove_board(id)
}

pub(crate) async fn update_list(backend: &InMemory, id: &ListId, title: &str) -> Result<List> {
    let now = backend.clock.now_millis();
    let mut state = backend.state.write().await;
    let list = state
        .lists
        .get_mut(id)
        .ok_or(BackendError::ListNotFound { id: *id })?;
    list.title = title.to_string();
    list.version += 1;
    list.updated_at = now;
    Ok(list.clone())
}

pub(crate) async fn update_card(
    backend: &InMemory,
    id: &CardId,
    update: &CardUpdate,
) -> Result<Card> {
    let now = backend.clock.now_millis();
    let mut state = backend.state.write().await;
    let card = state
        .cards
        .get_mut(id)
        .ok_or(BackendError::CardNotFound { id: *id })?;
    update.apply_to(card);
    card.version += 1;
    card.updated_at = now;
    Ok(card.clone())
}

/// Members of a scope in display order. Fails if the scope's parent is gone.
async fn ordered_members(backend: &InMemory, scope: &Scope) -> Result<Vec<Entity>> {
    let state = backend.state.read().await;
    if !state.scope_exists(scope) {
        return Err(BackendError::ScopeNotFound { scope: *scope }.into());
    }
    let mut members = state.members_of(scope);
    sort_by_rank(&mut members);
    Ok(members)
}

pub(crate) async fn lists_in_board(backend: &InMemory, board_id: &BoardId) -> Result<Vec<List>> {
    let members = ordered_members(backend, &Scope::Board(*board_id)).await?;
    Ok(members.into_iter().filter_map(Entity::into_list).collect())
}

pub(crate) async fn cards_in_list(backend: &InMemory, list_id: &ListId) -> Result<Vec<Card>> {
    let members = ordered_members(backend, &Scope::List(*list_id)).await?;
    Ok(members.into_iter().filter_map(Entity::into_card).collect())
}

pub(crate) async fn delete_list(backend: &InMemory, id: &ListId) -> Result<()> {
    let mut state = backend.state.write().await;
    state.remove_list(id)
}

pub(crate) async fn delete_card(backend: &InMemory, id: &CardId) -> Result<()> {
    let mut state = backend.state.write().await;
    state
        .cards
        .remove(id)
        .map(|_| ())
        .ok_or_else(|| BackendError::CardNotFound { id: *id }.into())
}

pub(crate) async fn add_member(backend: &InMemory, board_id: &BoardId, user_id: &UserId) -> Result<()> {
    let mut state = backend.state.write().await;
    if !state.boards.contains_key(board_id) {
        return Err(BackendError::BoardNotFound { id: *board_id }.into());
    }
    state.members.entry(*board_id).or_default().insert(*user_id);
    Ok(())
}

pub(crate) async fn is_member(backend: &InMemory, board_id: &BoardId, user_id: &UserId) -> Result<bool> {
    let state = backend.state.read().await;
    Ok(state
        .members
        .get(board_id)
        .is_some_and(|members| members.contains(user_id)))
}
