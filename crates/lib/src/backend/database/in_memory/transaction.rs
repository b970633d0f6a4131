//! Scope transactions for the InMemory backend.
//!
//! Each ordering scope has its own async mutex. A transaction holds the owned
//! guard for its whole lifetime, stages every written row locally and applies
//! the staged rows under the state write lock in `commit`. Dropping the
//! transaction discards the staged rows and releases the scope.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::storage::State;
use crate::{
    Result,
    backend::{ScopeTransaction, errors::BackendError},
    clock::Clock,
    entity::{
        BoardId, Card, CardId, DEFAULT_CARD_STATUS, Entity, EntityKind, List, ListId, NewCard,
        Scope, sort_by_rank,
    },
    rank::Rank,
};

pub(crate) struct InMemoryTransaction {
    scope: Scope,
    board_id: BoardId,
    state: Arc<RwLock<State>>,
    clock: Arc<dyn Clock>,
    lists: HashMap<ListId, List>,
    cards: HashMap<CardId, Card>,
    /// Scope each pre-existing written row was in when first read.
    base_scopes: HashMap<Uuid, (EntityKind, Scope)>,
    _scope_guard: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    pub(crate) fn new(
        scope: Scope,
        board_id: BoardId,
        state: Arc<RwLock<State>>,
        clock: Arc<dyn Clock>,
        scope_guard: OwnedMutexGuard<()>,
    ) -> Self {
        Self {
            scope,
            board_id,
            state,
            clock,
            lists: HashMap::new(),
            cards: HashMap::new(),
            base_scopes: HashMap::new(),
            _scope_guard: scope_guard,
        }
    }

    /// Current row for `id`, staged rows first.
    async fn read(&self, kind: EntityKind, id: Uuid) -> Result<Entity> {
        let staged = match kind {
            EntityKind::List => self.lists.get(&id).cloned().map(Entity::List),
            EntityKind::Card => self.cards.get(&id).cloned().map(Entity::Card),
        };
        if let Some(entity) = staged {
            return Ok(entity);
        }

        let state = self.state.read().await;
        let committed = match kind {
            EntityKind::List => state.lists.get(&id).cloned().map(Entity::List),
            EntityKind::Card => state.cards.get(&id).cloned().map(Entity::Card),
        };
        committed.ok_or_else(|| BackendError::entity_not_found(kind, id).into())
    }

    /// Stage a rewritten row. `previous` is the row as this transaction last
    /// saw it; the first write of a committed row records its base scope.
    fn stage(&mut self, previous: &Entity, entity: Entity) {
        if !self.is_staged(previous) {
            self.base_scopes
                .insert(previous.id(), (previous.kind(), previous.scope()));
        }
        match entity {
            Entity::List(list) => {
                self.lists.insert(list.id, list);
            }
            Entity::Card(card) => {
                self.cards.insert(card.id, card);
            }
        }
    }

    fn is_staged(&self, entity: &Entity) -> bool {
        match entity {
            Entity::List(list) => self.lists.contains_key(&list.id),
            Entity::Card(card) => self.cards.contains_key(&card.id),
        }
    }

    /// Apply `rank` (and optionally a new scope) to `entity`, bumping its
    /// bookkeeping fields. A row is bumped once per transaction.
    fn rerank(&self, entity: Entity, rank: Rank, new_scope: Option<&Scope>) -> Result<Entity> {
        let now = self.clock.now_millis();
        let bump = i64::from(!self.is_staged(&entity));
        match entity {
            Entity::List(mut list) => {
                if let Some(scope) = new_scope {
                    let Scope::Board(board_id) = scope else {
                        return Err(scope_kind_mismatch(scope, EntityKind::List));
                    };
                    list.board_id = *board_id;
                }
                list.rank = rank;
                list.version += bump;
                list.updated_at = now;
                Ok(Entity::List(list))
            }
            Entity::Card(mut card) => {
                if let Some(scope) = new_scope {
                    let Scope::List(list_id) = scope else {
                        return Err(scope_kind_mismatch(scope, EntityKind::Card));
                    };
                    card.list_id = *list_id;
                }
                card.rank = rank;
                card.version += bump;
                card.updated_at = now;
                Ok(Entity::Card(card))
            }
        }
    }
}

fn scope_kind_mismatch(scope: &Scope, kind: EntityKind) -> crate::Error {
    BackendError::StateInconsistency {
        reason: format!("{scope} cannot hold a {kind}"),
    }
    .into()
}

#[async_trait]
impl ScopeTransaction for InMemoryTransaction {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn board_id(&self) -> BoardId {
        self.board_id
    }

    async fn get_entity(&mut self, kind: EntityKind, id: Uuid) -> Result<Entity> {
        self.read(kind, id).await
    }

    async fn siblings_by_rank(&mut self) -> Result<Vec<Entity>> {
        let mut members: HashMap<Uuid, Entity> = {
            let state = self.state.read().await;
            state
                .members_of(&self.scope)
                .into_iter()
                .map(|entity| (entity.id(), entity))
                .collect()
        };

        // Staged rows may have moved into or out of this scope.
        let staged = self
            .lists
            .values()
            .cloned()
            .map(Entity::List)
            .chain(self.cards.values().cloned().map(Entity::Card));
        for entity in staged {
            if entity.scope() == self.scope {
                members.insert(entity.id(), entity);
            } else {
                members.remove(&entity.id());
            }
        }

        let mut siblings: Vec<Entity> = members.into_values().collect();
        sort_by_rank(&mut siblings);
        Ok(siblings)
    }

    async fn update_rank(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        rank: Rank,
        new_scope: Option<&Scope>,
    ) -> Result<Entity> {
        let current = self.read(kind, id).await?;
        let updated = self.rerank(current.clone(), rank, new_scope)?;
        self.stage(&current, updated.clone());
        Ok(updated)
    }

    async fn bulk_update_ranks(&mut self, updates: &[(Uuid, Rank)]) -> Result<()> {
        let kind = self.scope.member_kind();
        for (id, rank) in updates {
            let current = self.read(kind, *id).await?;
            if current.scope() != self.scope {
                return Err(BackendError::StateInconsistency {
                    reason: format!("{kind} {id} is not a member of {}", self.scope),
                }
                .into());
            }
            let updated = self.rerank(current.clone(), *rank, None)?;
            self.stage(&current, updated);
        }
        Ok(())
    }

    async fn insert_list(&mut self, title: &str, rank: Rank) -> Result<List> {
        let Scope::Board(board_id) = self.scope else {
            return Err(scope_kind_mismatch(&self.scope, EntityKind::List));
        };
        let now = self.clock.now_millis();
        let list = List {
            id: Uuid::new_v4(),
            board_id,
            title: title.to_string(),
            rank,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        self.lists.insert(list.id, list.clone());
        Ok(list)
    }

    async fn insert_card(&mut self, card: &NewCard, rank: Rank) -> Result<Card> {
        let Scope::List(list_id) = self.scope else {
            return Err(scope_kind_mismatch(&self.scope, EntityKind::Card));
        };
        let now = self.clock.now_millis();
        let card = Card {
            id: Uuid::new_v4(),
            board_id: self.board_id,
            list_id,
            title: card.title.clone(),
            description: card.description.clone(),
            status: card
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_CARD_STATUS.to_string()),
            rank,
            created_by: card.created_by,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        self.cards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let now = this.clock.now_millis();
        let mut state = this.state.write().await;

        // Validate everything before mutating so a failure leaves state intact.
        if !state.scope_exists(&this.scope) {
            return Err(BackendError::ScopeNotFound { scope: this.scope }.into());
        }
        // Rows leave a scope under the destination scope's lock only, so a
        // row that is no longer where we read it was moved concurrently.
        for (id, (kind, scope)) in &this.base_scopes {
            let committed = match kind {
                EntityKind::List => state.lists.get(id).map(|list| Entity::List(list.clone())),
                EntityKind::Card => state.cards.get(id).map(|card| Entity::Card(card.clone())),
            };
            if committed.map(|entity| entity.scope()) != Some(*scope) {
                return Err(BackendError::WriteConflict {
                    kind: *kind,
                    id: *id,
                }
                .into());
            }
        }
        for card in this.cards.values() {
            if !state.lists.contains_key(&card.list_id) {
                return Err(BackendError::StateInconsistency {
                    reason: format!("card {} references missing list {}", card.id, card.list_id),
                }
                .into());
            }
        }
        for list in this.lists.values() {
            if !state.boards.contains_key(&list.board_id) {
                return Err(BackendError::StateInconsistency {
                    reason: format!("list {} references missing board {}", list.id, list.board_id),
                }
                .into());
            }
        }

        state.touch_scope(&this.scope, now)?;
        // Only ordering fields come from staged rows. Titles and descriptions
        // may have been edited outside the scope lock meanwhile.
        for (id, list) in this.lists {
            match state.lists.get_mut(&id) {
                Some(committed) => {
                    committed.board_id = list.board_id;
                    committed.rank = list.rank;
                    committed.updated_at = list.updated_at;
                    committed.version += 1;
                }
                None => {
                    state.lists.insert(id, list);
                }
            }
        }
        for (id, card) in this.cards {
            match state.cards.get_mut(&id) {
                Some(committed) => {
                    committed.list_id = card.list_id;
                    committed.rank = card.rank;
                    committed.updated_at = card.updated_at;
                    committed.version += 1;
                }
                None => {
                    state.cards.insert(id, card);
                }
            }
        }
        Ok(())
    }
}
