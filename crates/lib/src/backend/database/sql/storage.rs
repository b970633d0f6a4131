//! Row mapping and plain (non-scope) operations for SQL backends.

use sqlx::Row;
use sqlx::any::AnyRow;
use uuid::Uuid;

use crate::Result;
use crate::backend::errors::BackendError;
use crate::entity::{Board, BoardId, Card, CardId, CardUpdate, List, ListId, UserId};
use crate::rank::reindexed_ranks;

use super::{SqlxBackend, SqlxResultExt};

pub(crate) const BOARD_COLUMNS: &str = "id, name, created_by, created_at, updated_at, version";
pub(crate) const LIST_COLUMNS: &str = "id, board_id, title, rank, created_at, updated_at, version";
pub(crate) const CARD_COLUMNS: &str = "id, board_id, list_id, title, description, status, rank, \
     created_by, created_at, updated_at, version";

/// Display order shared by every sibling query.
pub(crate) const RANK_ORDER: &str = "ORDER BY rank ASC, created_at ASC, id ASC";

fn column<T>(row: &AnyRow, name: &str) -> Result<T>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get(name)
        .sql_context(&format!("Failed to read column {name}"))
}

fn uuid_column(row: &AnyRow, name: &str) -> Result<Uuid> {
    let raw: String = column(row, name)?;
    Uuid::parse_str(&raw).map_err(|e| {
        BackendError::StateInconsistency {
            reason: format!("column {name} holds invalid id {raw:?}: {e}"),
        }
        .into()
    })
}

pub(crate) fn board_from_row(row: &AnyRow) -> Result<Board> {
    Ok(Board {
        id: uuid_column(row, "id")?,
        name: column(row, "name")?,
        created_by: uuid_column(row, "created_by")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        version: column(row, "version")?,
    })
}

pub(crate) fn list_from_row(row: &AnyRow) -> Result<List> {
    Ok(List {
        id: uuid_column(row, "id")?,
        board_id: uuid_column(row, "board_id")?,
        title: column(row, "title")?,
        rank: column(row, "rank")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        version: column(row, "version")?,
    })
}

pub(crate) fn card_from_row(row: &AnyRow) -> Result<Card> {
    Ok(Card {
        id: uuid_column(row, "id")?,
        board_id: uuid_column(row, "board_id")?,
        list_id: uuid_column(row, "list_id")?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        status: column(row, "status")?,
        rank: column(row, "rank")?,
        created_by: uuid_column(row, "created_by")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        version: column(row, "version")?,
    })
}

pub(crate) async fn create_board(
    backend: &SqlxBackend,
    name: &str,
    created_by: UserId,
    list_titles: &[&str],
) -> Result<Board> {
    let now = backend.now();
    let board = Board {
        id: Uuid::new_v4(),
        name: name.to_string(),
        created_by,
        created_at: now,
        updated_at: now,
        version: 1,
    };

    let mut tx = backend
        .pool()
        .begin()
        .await
        .sql_context("Failed to begin transaction")?;

    sqlx::query(
        "INSERT INTO boards (id, name, created_by, created_at, updated_at, version)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(board.id.to_string())
    .bind(&board.name)
    .bind(board.created_by.to_string())
    .bind(board.created_at)
    .bind(board.updated_at)
    .bind(board.version)
    .execute(&mut *tx)
    .await
    .sql_context("Failed to insert board")?;

    sqlx::query("INSERT INTO board_members (board_id, user_id) VALUES ($1, $2)")
        .bind(board.id.to_string())
        .bind(created_by.to_string())
        .execute(&mut *tx)
        .await
        .sql_context("Failed to insert board owner")?;

    for (title, rank) in list_titles.iter().zip(reindexed_ranks(list_titles.len())) {
        sqlx::query(
            "INSERT INTO lists (id, board_id, title, rank, created_at, updated_at, version)
             VALUES ($1, $2, $3, $4, $5, $6, 1)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(board.id.to_string())
        .bind(*title)
        .bind(rank)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .sql_context("Failed to insert default list")?;
    }

    tx.commit()
        .await
        .sql_context("Failed to commit transaction")?;
    Ok(board)
}

pub(crate) async fn get_board(backend: &SqlxBackend, id: &BoardId) -> Result<Board> {
    let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(backend.pool())
        .await
        .sql_context("Failed to get board")?;

    match row {
        Some(row) => board_from_row(&row),
        None => Err(BackendError::BoardNotFound { id: *id }.into()),
    }
}

pub(crate) async fn boards_for_user(backend: &SqlxBackend, user_id: &UserId) -> Result<Vec<Board>> {
    let sql = format!(
        "SELECT {BOARD_COLUMNS} FROM boards
         WHERE created_by = $1
            OR id IN (SELECT board_id FROM board_members WHERE user_id = $2)
         ORDER BY updated_at DESC, id ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(backend.pool())
        .await
        .sql_context("Failed to list boards of user")?;

    rows.iter().map(board_from_row).collect()
}

pub(crate) async fn rename_board(backend: &SqlxBackend, id: &BoardId, name: &str) -> Result<Board> {
    let sql = format!(
        "UPDATE boards SET name = $1, version = version + 1, updated_at = $2 WHERE id = $3
         RETURNING {BOARD_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(name)
        .bind(backend.now())
        .bind(id.to_string())
        .fetch_optional(backend.pool())
        .await
        .sql_context("Failed to rename board")?;

    match row {
        Some(row) => board_from_row(&row),
        None => Err(BackendError::BoardNotFound { id: *id }.into()),
    }
}

pub(crate) async fn delete_board(backend: &SqlxBackend, id: &BoardId) -> Result<()> {
    let mut tx = backend
        .pool()
        .begin()
        .await
        .sql_context("Failed to begin transaction")?;

    let deleted = sqlx::query("DELETE FROM boards WHERE id = $1")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .sql_context("Failed to delete board")?;
    if deleted.rows_affected() == 0 {
        return Err(BackendError::BoardNotFound { id: *id }.into());
    }

    for (table, column) in [
        ("cards", "board_id"),
        ("lists", "board_id"),
        ("board_members", "board_id"),
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE {column} = $1"))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .sql_context(&format!("Failed to delete {table} of board"))?;
    }

    tx.commit()
        .await
        .sql_context("Failed to commit transaction")?;
    Ok(())
}

pub(crate) async fn update_list(backend: &SqlxBackend, id: &ListId, title: &str) -> Result<List> {
    let sql = format!(
        "UPDATE lists SET title = $1, version = version + 1, updated_at = $2 WHERE id = $3
         RETURNING {LIST_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(title)
        .bind(backend.now())
        .bind(id.to_string())
        .fetch_optional(backend.pool())
        .await
        .sql_context("Failed to update list")?;

    match row {
        Some(row) => list_from_row(&row),
        None => Err(BackendError::ListNotFound { id: *id }.into()),
    }
}

pub(crate) async fn update_card(
    backend: &SqlxBackend,
    id: &CardId,
    update: &CardUpdate,
) -> Result<Card> {
    // Unset fields keep their stored value.
    let sql = format!(
        "UPDATE cards SET title = COALESCE($1, title), description = COALESCE($2, description),
                version = version + 1, updated_at = $3
         WHERE id = $4
         RETURNING {CARD_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(update.title.clone())
        .bind(update.description.clone())
        .bind(backend.now())
        .bind(id.to_string())
        .fetch_optional(backend.pool())
        .await
        .sql_context("Failed to update card")?;

    match row {
        Some(row) => card_from_row(&row),
        None => Err(BackendError::CardNotFound { id: *id }.into()),
    }
}

pub(crate) async fn get_list(backend: &SqlxBackend, id: &ListId) -> Result<List> {
    let sql = format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(backend.pool())
        .await
        .sql_context("Failed to get list")?;

    match row {
        Some(row) => list_from_row(&row),
        None => Err(BackendError::ListNotFound { id: *id }.into()),
    }
}

pub(crate) async fn get_card(backend: &SqlxBackend, id: &CardId) -> Result<Card> {
    let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(backend.pool())
        .await
        .sql_context("Failed to get card")?;

    match row {
        Some(row) => card_from_row(&row),
        None => Err(BackendError::CardNotFound { id: *id }.into()),
    }
}

pub(crate) async fn lists_in_board(backend: &SqlxBackend, board_id: &BoardId) -> Result<Vec<List>> {
    // Distinguish "no lists" from "no board".
    get_board(backend, board_id).await?;

    let sql = format!("SELECT {LIST_COLUMNS} FROM lists WHERE board_id = $1 {RANK_ORDER}");
    let rows = sqlx::query(&sql)
        .bind(board_id.to_string())
        .fetch_all(backend.pool())
        .await
        .sql_context("Failed to list board lists")?;

    rows.iter().map(list_from_row).collect()
}

pub(crate) async fn cards_in_list(backend: &SqlxBackend, list_id: &ListId) -> Result<Vec<Card>> {
    get_list(backend, list_id).await?;

    let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE list_id = $1 {RANK_ORDER}");
    let rows = sqlx::query(&sql)
        .bind(list_id.to_string())
        .fetch_all(backend.pool())
        .await
        .sql_context("Failed to list cards")?;

    rows.iter().map(card_from_row).collect()
}

pub(crate) async fn delete_list(backend: &SqlxBackend, id: &ListId) -> Result<()> {
    let mut tx = backend
        .pool()
        .begin()
        .await
        .sql_context("Failed to begin transaction")?;

    let deleted = sqlx::query("DELETE FROM lists WHERE id = $1")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .sql_context("Failed to delete list")?;
    if deleted.rows_affected() == 0 {
        return Err(BackendError::ListNotFound { id: *id }.into());
    }

    sqlx::query("DELETE FROM cards WHERE list_id = $1")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .sql_context("Failed to delete cards of list")?;

    tx.commit()
        .await
        .sql_context("Failed to commit transaction")?;
    Ok(())
}

pub(crate) async fn delete_card(backend: &SqlxBackend, id: &CardId) -> Result<()> {
    let deleted = sqlx::query("DELETE FROM cards WHERE id = $1")
        .bind(id.to_string())
        .execute(backend.pool())
        .await
        .sql_context("Failed to delete card")?;
    if deleted.rows_affected() == 0 {
        return Err(BackendError::CardNotFound { id: *id }.into());
    }
    Ok(())
}

pub(crate) async fn add_member(
    backend: &SqlxBackend,
    board_id: &BoardId,
    user_id: &UserId,
) -> Result<()> {
    get_board(backend, board_id).await?;

    // INSERT OR IGNORE (SQLite) vs ON CONFLICT DO NOTHING (Postgres)
    let sql = if backend.is_sqlite() {
        "INSERT OR IGNORE INTO board_members (board_id, user_id) VALUES ($1, $2)"
    } else {
        "INSERT INTO board_members (board_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
    };
    sqlx::query(sql)
        .bind(board_id.to_string())
        .bind(user_id.to_string())
        .execute(backend.pool())
        .await
        .sql_context("Failed to insert board member")?;
    Ok(())
}

pub(crate) async fn is_member(
    backend: &SqlxBackend,
    board_id: &BoardId,
    user_id: &UserId,
) -> Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM board_members WHERE board_id = $1 AND user_id = $2")
            .bind(board_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(backend.pool())
            .await
            .sql_context("Failed to check board membership")?;
    Ok(row.is_some())
}
