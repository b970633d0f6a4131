use std::sync::Arc;

use kanban_rank::{
    Backend, BoardAccess, FixedClock, NewCard, Placement, Rank, Reorderer,
    backend::BackendImpl,
    backend::database::InMemory,
    entity::{BoardId, ListId, UserId},
};
use uuid::Uuid;

// ==========================
// CORE TEST FACTORIES
// ==========================
// These are the foundation for all test setup. They provide a single point of change
// for backend matrix testing via TEST_BACKEND env var.

/// Creates a test backend based on TEST_BACKEND env var.
///
/// Supported values:
/// - "inmemory" or unset: InMemory backend (default)
/// - "sqlite": SQLite in-memory backend (requires `sqlite` feature)
/// - "postgres": PostgreSQL backend (requires `postgres` feature and TEST_POSTGRES_URL)
///
/// Every backend stamps rows with a [`FixedClock`], so creation order is
/// strictly increasing.
///
/// # Example
/// ```bash
/// # Run tests with InMemory (default)
/// cargo test
///
/// # Run tests with SQLite
/// TEST_BACKEND=sqlite cargo test --features sqlite
///
/// # Run tests with PostgreSQL
/// TEST_BACKEND=postgres TEST_POSTGRES_URL="postgres://localhost/kanban_test" \
///   cargo test --features postgres
/// ```
pub async fn test_backend() -> Box<dyn BackendImpl> {
    let clock = Arc::new(FixedClock::default());
    match std::env::var("TEST_BACKEND").as_deref() {
        Ok("sqlite") => {
            #[cfg(feature = "sqlite")]
            {
                use kanban_rank::backend::database::Sqlite;
                Box::new(
                    Sqlite::in_memory()
                        .await
                        .expect("Failed to create SQLite backend")
                        .with_clock(clock),
                )
            }
            #[cfg(not(feature = "sqlite"))]
            {
                panic!("TEST_BACKEND=sqlite requires the 'sqlite' feature to be enabled")
            }
        }
        Ok("postgres") => {
            #[cfg(feature = "postgres")]
            {
                use kanban_rank::backend::database::Postgres;
                let url = std::env::var("TEST_POSTGRES_URL")
                    .unwrap_or_else(|_| "postgres://localhost/kanban_test".to_string());
                Box::new(
                    Postgres::connect_isolated(&url)
                        .await
                        .expect("Failed to connect to PostgreSQL")
                        .with_clock(clock),
                )
            }
            #[cfg(not(feature = "postgres"))]
            {
                panic!("TEST_BACKEND=postgres requires the 'postgres' feature to be enabled")
            }
        }
        Ok("inmemory") | Ok("") | Err(_) => Box::new(InMemory::with_clock(clock)),
        Ok(other) => {
            panic!("Unknown TEST_BACKEND value: {other}. Supported: inmemory, sqlite, postgres")
        }
    }
}

/// An InMemory backend regardless of TEST_BACKEND.
///
/// Used by tests that hold a scope transaction open while reading through
/// the backend, or that race many transactions against each other.
pub fn in_memory_backend() -> Backend {
    let backend: Box<dyn BackendImpl> =
        Box::new(InMemory::with_clock(Arc::new(FixedClock::default())));
    Backend::from(backend)
}

/// A reorderer with membership-based access control over the test backend.
pub async fn test_reorderer() -> Reorderer<BoardAccess> {
    reorderer_for(Backend::from(test_backend().await))
}

pub fn reorderer_for(backend: Backend) -> Reorderer<BoardAccess> {
    Reorderer::new(backend.clone(), BoardAccess::new(backend))
}

// ==========================
// FIXTURES
// ==========================

/// Creates a board owned by a fresh user. Returns (board_id, owner).
pub async fn board(reorderer: &Reorderer<BoardAccess>) -> (BoardId, UserId) {
    let owner = Uuid::new_v4();
    let board = reorderer
        .backend()
        .create_empty_board("Test board", owner)
        .await
        .expect("Failed to create board");
    (board.id, owner)
}

/// Appends `count` lists to a board, returning their ids in display order.
pub async fn lists(
    reorderer: &Reorderer<BoardAccess>,
    owner: &UserId,
    board_id: BoardId,
    count: usize,
) -> Vec<ListId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let outcome = reorderer
            .create_list(owner, board_id, &format!("List {i}"), Placement::tail())
            .await
            .expect("Failed to create list");
        ids.push(outcome.entity.id());
    }
    ids
}

/// Appends `count` cards to a list, returning their ids in display order.
pub async fn cards(
    reorderer: &Reorderer<BoardAccess>,
    owner: &UserId,
    list_id: ListId,
    count: usize,
) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let outcome = reorderer
            .create_card(
                owner,
                list_id,
                &NewCard::new(format!("Card {i}"), *owner),
                Placement::tail(),
            )
            .await
            .expect("Failed to create card");
        ids.push(outcome.entity.id());
    }
    ids
}

/// A board owned by a fresh user with one list holding `count` cards.
/// Returns (board_id, owner, list_id, card ids).
pub async fn board_with_cards(
    reorderer: &Reorderer<BoardAccess>,
    count: usize,
) -> (BoardId, UserId, ListId, Vec<Uuid>) {
    let (board_id, owner) = board(reorderer).await;
    let list_id = lists(reorderer, &owner, board_id, 1).await[0];
    let card_ids = cards(reorderer, &owner, list_id, count).await;
    (board_id, owner, list_id, card_ids)
}

// ==========================
// ASSERTION HELPERS
// ==========================

/// (id, rank) of the cards of a list in display order.
pub async fn card_order(backend: &Backend, list_id: &ListId) -> Vec<(Uuid, Rank)> {
    backend
        .cards_in_list(list_id)
        .await
        .expect("Failed to read cards")
        .into_iter()
        .map(|card| (card.id, card.rank))
        .collect()
}

/// (id, rank) of the lists of a board in display order.
pub async fn list_order(backend: &Backend, board_id: &BoardId) -> Vec<(Uuid, Rank)> {
    backend
        .lists_in_board(board_id)
        .await
        .expect("Failed to read lists")
        .into_iter()
        .map(|list| (list.id, list.rank))
        .collect()
}

/// Asserts that ranks are strictly increasing.
pub fn assert_strictly_increasing(order: &[(Uuid, Rank)]) {
    for pair in order.windows(2) {
        assert!(
            pair[0].1 < pair[1].1,
            "ranks not strictly increasing: {order:?}"
        );
    }
}
