//! Scope transactions for SQL backends.
//!
//! The first statement of every scope transaction bumps the scope parent's
//! row. Rank writes are conditional on the row still being in the scope it
//! was read from, so a concurrent move out of the scope surfaces as
//! [`BackendError::WriteConflict`] instead of a lost update.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Any, Transaction};
use uuid::Uuid;

use super::storage::{CARD_COLUMNS, LIST_COLUMNS, RANK_ORDER, card_from_row, list_from_row};
use super::{SqlxBackend, SqlxResultExt};
use crate::Result;
use crate::backend::ScopeTransaction;
use crate::backend::errors::BackendError;
use crate::entity::{
    BoardId, Card, DEFAULT_CARD_STATUS, Entity, EntityKind, List, NewCard, Scope,
};
use crate::rank::Rank;

pub(crate) struct SqlxScopeTransaction {
    tx: Transaction<'static, Any>,
    scope: Scope,
    board_id: BoardId,
    now: i64,
    /// Rows whose version was already bumped by this transaction.
    touched: HashSet<Uuid>,
}

fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::List => "lists",
        EntityKind::Card => "cards",
    }
}

/// Column holding the id of the scope a row of `kind` belongs to.
fn scope_column(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::List => "board_id",
        EntityKind::Card => "list_id",
    }
}

fn scope_kind_mismatch(scope: &Scope, kind: EntityKind) -> crate::Error {
    BackendError::StateInconsistency {
        reason: format!("{scope} cannot hold a {kind}"),
    }
    .into()
}

impl SqlxScopeTransaction {
    pub(crate) async fn begin(backend: &SqlxBackend, scope: &Scope) -> Result<Self> {
        let now = backend.now();
        let mut tx = backend
            .pool()
            .begin()
            .await
            .sql_context("Failed to begin scope transaction")?;

        // Takes the parent's row lock (PostgreSQL) or the write lock (SQLite)
        // until commit or rollback.
        let sql = match scope {
            Scope::Board(_) => {
                "UPDATE boards SET version = version + 1, updated_at = $1 WHERE id = $2 \
                 RETURNING id"
            }
            Scope::List(_) => {
                "UPDATE lists SET version = version + 1, updated_at = $1 WHERE id = $2 \
                 RETURNING board_id"
            }
        };
        let row: Option<(String,)> = sqlx::query_as(sql)
            .bind(now)
            .bind(scope.parent_id().to_string())
            .fetch_optional(&mut *tx)
            .await
            .sql_context("Failed to lock scope")?;

        let Some((board_id,)) = row else {
            return Err(BackendError::ScopeNotFound { scope: *scope }.into());
        };
        let board_id = Uuid::parse_str(&board_id).map_err(|e| BackendError::StateInconsistency {
            reason: format!("{scope} references invalid board id {board_id:?}: {e}"),
        })?;

        Ok(Self {
            tx,
            scope: *scope,
            board_id,
            now,
            touched: HashSet::new(),
        })
    }

    /// Version increment for the next write of `id`: one per transaction.
    fn bump(&mut self, id: Uuid) -> i64 {
        i64::from(self.touched.insert(id))
    }
}

#[async_trait]
impl ScopeTransaction for SqlxScopeTransaction {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn board_id(&self) -> BoardId {
        self.board_id
    }

    async fn get_entity(&mut self, kind: EntityKind, id: Uuid) -> Result<Entity> {
        let sql = match kind {
            EntityKind::List => format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = $1"),
            EntityKind::Card => format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1"),
        };
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .sql_context(&format!("Failed to get {kind}"))?;

        let Some(row) = row else {
            return Err(BackendError::entity_not_found(kind, id).into());
        };
        match kind {
            EntityKind::List => list_from_row(&row).map(Entity::List),
            EntityKind::Card => card_from_row(&row).map(Entity::Card),
        }
    }

    async fn siblings_by_rank(&mut self) -> Result<Vec<Entity>> {
        let parent = self.scope.parent_id().to_string();
        match self.scope {
            Scope::Board(_) => {
                let sql =
                    format!("SELECT {LIST_COLUMNS} FROM lists WHERE board_id = $1 {RANK_ORDER}");
                let rows = sqlx::query(&sql)
                    .bind(parent)
                    .fetch_all(&mut *self.tx)
                    .await
                    .sql_context("Failed to read sibling lists")?;
                rows.iter()
                    .map(|row| list_from_row(row).map(Entity::List))
                    .collect()
            }
            Scope::List(_) => {
                let sql =
                    format!("SELECT {CARD_COLUMNS} FROM cards WHERE list_id = $1 {RANK_ORDER}");
                let rows = sqlx::query(&sql)
                    .bind(parent)
                    .fetch_all(&mut *self.tx)
                    .await
                    .sql_context("Failed to read sibling cards")?;
                rows.iter()
                    .map(|row| card_from_row(row).map(Entity::Card))
                    .collect()
            }
        }
    }

    async fn update_rank(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        rank: Rank,
        new_scope: Option<&Scope>,
    ) -> Result<Entity> {
        let current = self.get_entity(kind, id).await?;
        let target = match new_scope {
            Some(scope) if scope.member_kind() != kind => {
                return Err(scope_kind_mismatch(scope, kind));
            }
            Some(scope) => *scope,
            None => current.scope(),
        };

        let sql = format!(
            "UPDATE {table} SET rank = $1, {column} = $2, version = version + $3, \
             updated_at = $4 WHERE id = $5 AND {column} = $6",
            table = table(kind),
            column = scope_column(kind),
        );
        let bump = self.bump(id);
        let result = sqlx::query(&sql)
            .bind(rank)
            .bind(target.parent_id().to_string())
            .bind(bump)
            .bind(self.now)
            .bind(id.to_string())
            .bind(current.scope().parent_id().to_string())
            .execute(&mut *self.tx)
            .await
            .sql_context(&format!("Failed to update {kind} rank"))?;
        if result.rows_affected() == 0 {
            return Err(BackendError::WriteConflict { kind, id }.into());
        }

        self.get_entity(kind, id).await
    }

    async fn bulk_update_ranks(&mut self, updates: &[(Uuid, Rank)]) -> Result<()> {
        let kind = self.scope.member_kind();
        let sql = format!(
            "UPDATE {table} SET rank = $1, version = version + $2, updated_at = $3 \
             WHERE id = $4 AND {column} = $5",
            table = table(kind),
            column = scope_column(kind),
        );
        let parent = self.scope.parent_id().to_string();

        for (id, rank) in updates {
            let bump = self.bump(*id);
            let result = sqlx::query(&sql)
                .bind(*rank)
                .bind(bump)
                .bind(self.now)
                .bind(id.to_string())
                .bind(&parent)
                .execute(&mut *self.tx)
                .await
                .sql_context("Failed to reindex scope")?;
            if result.rows_affected() == 0 {
                return Err(BackendError::WriteConflict { kind, id: *id }.into());
            }
        }
        Ok(())
    }

    async fn insert_list(&mut self, title: &str, rank: Rank) -> Result<List> {
        let Scope::Board(board_id) = self.scope else {
            return Err(scope_kind_mismatch(&self.scope, EntityKind::List));
        };
        let list = List {
            id: Uuid::new_v4(),
            board_id,
            title: title.to_string(),
            rank,
            created_at: self.now,
            updated_at: self.now,
            version: 1,
        };

        sqlx::query(
            "INSERT INTO lists (id, board_id, title, rank, created_at, updated_at, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(list.id.to_string())
        .bind(list.board_id.to_string())
        .bind(&list.title)
        .bind(list.rank)
        .bind(list.created_at)
        .bind(list.updated_at)
        .bind(list.version)
        .execute(&mut *self.tx)
        .await
        .sql_context("Failed to insert list")?;

        self.touched.insert(list.id);
        Ok(list)
    }

    async fn insert_card(&mut self, card: &NewCard, rank: Rank) -> Result<Card> {
        let Scope::List(list_id) = self.scope else {
            return Err(scope_kind_mismatch(&self.scope, EntityKind::Card));
        };
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
            created_at: self.now,
            updated_at: self.now,
            version: 1,
        };

        sqlx::query(
            "INSERT INTO cards (id, board_id, list_id, title, description, status, rank, \
             created_by, created_at, updated_at, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(card.id.to_string())
        .bind(card.board_id.to_string())
        .bind(card.list_id.to_string())
        .bind(&card.title)
        .bind(&card.description)
        .bind(&card.status)
        .bind(card.rank)
        .bind(card.created_by.to_string())
        .bind(card.created_at)
        .bind(card.updated_at)
        .bind(card.version)
        .execute(&mut *self.tx)
        .await
        .sql_context("Failed to insert card")?;

        self.touched.insert(card.id);
        Ok(card)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .sql_context("Failed to commit scope transaction")
    }
}
