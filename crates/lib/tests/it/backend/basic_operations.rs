use kanban_rank::{
    Backend, CardUpdate, NewCard, Scope,
    backend::BackendError,
};
use uuid::Uuid;

use crate::helpers::*;

#[tokio::test]
async fn test_create_and_get_board() {
    let backend = Backend::from(test_backend().await);
    let owner = Uuid::new_v4();

    let board = backend.create_board("Roadmap", owner).await.unwrap();
    assert_eq!(board.name, "Roadmap");
    assert_eq!(board.created_by, owner);
    assert_eq!(board.version, 1);
    assert_eq!(board.created_at, board.updated_at);

    let fetched = backend.get_board(&board.id).await.unwrap();
    assert_eq!(fetched, board);

    // Seeded with the default lists, evenly spaced
    let lists = backend.lists_in_board(&board.id).await.unwrap();
    let seeded: Vec<(&str, i64)> = lists
        .iter()
        .map(|list| (list.title.as_str(), list.rank))
        .collect();
    assert_eq!(seeded, vec![("To Do", 1000), ("Doing", 2000), ("Done", 3000)]);
    assert!(lists.iter().all(|list| list.version == 1));

    // The creator holds a membership
    assert!(backend.is_member(&board.id, &owner).await.unwrap());
}

#[tokio::test]
async fn test_empty_board_has_no_lists() {
    let backend = Backend::from(test_backend().await);
    let board = backend
        .create_empty_board("Scratch", Uuid::new_v4())
        .await
        .unwrap();
    assert!(backend.lists_in_board(&board.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_rows_are_not_found() {
    let backend = Backend::from(test_backend().await);
    let id = Uuid::new_v4();

    let err = backend.get_board(&id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.is_database_error());

    assert!(backend.get_list(&id).await.unwrap_err().is_not_found());
    assert!(backend.get_card(&id).await.unwrap_err().is_not_found());
    assert!(backend.lists_in_board(&id).await.unwrap_err().is_not_found());
    assert!(backend.cards_in_list(&id).await.unwrap_err().is_not_found());
    assert!(backend.delete_card(&id).await.unwrap_err().is_not_found());
    assert!(backend.delete_list(&id).await.unwrap_err().is_not_found());
    assert!(backend.delete_board(&id).await.unwrap_err().is_not_found());
    assert!(backend.rename_board(&id, "x").await.unwrap_err().is_not_found());
    assert!(backend.update_list(&id, "x").await.unwrap_err().is_not_found());
    assert!(
        backend
            .update_card(&id, &CardUpdate::default())
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_begin_scope_on_missing_parent() {
    let backend = Backend::from(test_backend().await);
    let scope = Scope::List(Uuid::new_v4());

    let err = backend.begin_scope(&scope).await.err().expect("scope should not open");
    assert!(err.is_not_found());
    match err {
        kanban_rank::Error::Backend(BackendError::ScopeNotFound { scope: missing }) => {
            assert_eq!(missing, scope)
        }
        other => panic!("Expected ScopeNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_membership() {
    let backend = Backend::from(test_backend().await);
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let board = backend.create_empty_board("Team", owner).await.unwrap();

    assert!(!backend.is_member(&board.id, &member).await.unwrap());
    backend.add_member(&board.id, &member).await.unwrap();
    // Idempotent
    backend.add_member(&board.id, &member).await.unwrap();
    assert!(backend.is_member(&board.id, &member).await.unwrap());

    assert!(backend.is_member(&board.id, &owner).await.unwrap());
    assert!(!backend.is_member(&board.id, &Uuid::new_v4()).await.unwrap());

    let err = backend
        .add_member(&Uuid::new_v4(), &member)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_card_keeps_sibling_ranks() {
    let reorderer = test_reorderer().await;
    let (_board_id, _owner, list_id, card_ids) = board_with_cards(&reorderer, 3).await;
    let backend = reorderer.backend();

    backend.delete_card(&card_ids[1]).await.unwrap();

    let order = card_order(backend, &list_id).await;
    assert_eq!(order, vec![(card_ids[0], 1000), (card_ids[2], 3000)]);
}

#[tokio::test]
async fn test_delete_list_removes_its_cards() {
    let reorderer = test_reorderer().await;
    let (board_id, owner) = board(&reorderer).await;
    let list_ids = lists(&reorderer, &owner, board_id, 3).await;
    let card_ids = cards(&reorderer, &owner, list_ids[0], 2).await;
    let backend = reorderer.backend();

    backend.delete_list(&list_ids[0]).await.unwrap();

    for card_id in &card_ids {
        assert!(backend.get_card(card_id).await.unwrap_err().is_not_found());
    }
    let order = list_order(backend, &board_id).await;
    assert_eq!(order, vec![(list_ids[1], 2000), (list_ids[2], 3000)]);
}

#[tokio::test]
async fn test_new_card_defaults() {
    let reorderer = test_reorderer().await;
    let (board_id, owner) = board(&reorderer).await;
    let list_id = lists(&reorderer, &owner, board_id, 1).await[0];

    let outcome = reorderer
        .create_card(
            &owner,
            list_id,
            &NewCard::new("Write docs", owner).with_description("Usage guide"),
            kanban_rank::Placement::tail(),
        )
        .await
        .unwrap();

    let card = reorderer.backend().get_card(&outcome.entity.id()).await.unwrap();
    assert_eq!(card.title, "Write docs");
    assert_eq!(card.description, "Usage guide");
    assert_eq!(card.status, kanban_rank::entity::DEFAULT_CARD_STATUS);
    assert_eq!(card.board_id, board_id);
    assert_eq!(card.list_id, list_id);
    assert_eq!(card.created_by, owner);
    assert_eq!(card.version, 1);
}

#[tokio::test]
async fn test_boards_for_user() {
    let backend = Backend::from(test_backend().await);
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();

    let older = backend.create_empty_board("Older", owner).await.unwrap();
    let newer = backend.create_empty_board("Newer", owner).await.unwrap();
    let shared = backend.create_empty_board("Shared", Uuid::new_v4()).await.unwrap();
    backend.add_member(&shared.id, &member).await.unwrap();

    let ids = |boards: Vec<kanban_rank::Board>| boards.into_iter().map(|b| b.id).collect::<Vec<_>>();
    assert_eq!(
        ids(backend.boards_for_user(&owner).await.unwrap()),
        vec![newer.id, older.id]
    );
    assert_eq!(
        ids(backend.boards_for_user(&member).await.unwrap()),
        vec![shared.id]
    );

    // Renaming bumps updated_at, so the board moves to the front
    backend.rename_board(&older.id, "Renamed").await.unwrap();
    assert_eq!(
        ids(backend.boards_for_user(&owner).await.unwrap()),
        vec![older.id, newer.id]
    );
    assert!(backend.boards_for_user(&Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rename_board_bumps_version() {
    let backend = Backend::from(test_backend().await);
    let board = backend.create_empty_board("Draft", Uuid::new_v4()).await.unwrap();

    let renamed = backend.rename_board(&board.id, "Final").await.unwrap();
    assert_eq!(renamed.name, "Final");
    assert_eq!(renamed.version, board.version + 1);
    assert!(renamed.updated_at > board.updated_at);
    assert_eq!(backend.get_board(&board.id).await.unwrap(), renamed);
}

#[tokio::test]
async fn test_title_updates_keep_rank() {
    let reorderer = test_reorderer().await;
    let (_board_id, _owner, list_id, card_ids) = board_with_cards(&reorderer, 2).await;
    let backend = reorderer.backend();

    let list = backend.update_list(&list_id, "Backlog").await.unwrap();
    assert_eq!(list.title, "Backlog");
    assert_eq!(list.rank, 1000);

    let before = backend.get_card(&card_ids[1]).await.unwrap();
    let card = backend
        .update_card(
            &card_ids[1],
            &CardUpdate {
                title: None,
                description: Some("Details".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(card.title, before.title);
    assert_eq!(card.description, "Details");
    assert_eq!(card.rank, before.rank);
    assert_eq!(card.version, before.version + 1);

    let card = backend
        .update_card(
            &card_ids[1],
            &CardUpdate {
                title: Some("Renamed".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(card.title, "Renamed");
    assert_eq!(card.description, "Details");
    assert_eq!(card_order(backend, &list_id).await.len(), 2);
}

#[tokio::test]
async fn test_delete_board_removes_everything() {
    let reorderer = test_reorderer().await;
    let (board_id, owner, list_id, card_ids) = board_with_cards(&reorderer, 2).await;
    let member = Uuid::new_v4();
    let backend = reorderer.backend();
    backend.add_member(&board_id, &member).await.unwrap();
    let other = backend.create_empty_board("Other", owner).await.unwrap();

    backend.delete_board(&board_id).await.unwrap();

    assert!(backend.get_board(&board_id).await.unwrap_err().is_not_found());
    assert!(backend.get_list(&list_id).await.unwrap_err().is_not_found());
    for card_id in &card_ids {
        assert!(backend.get_card(card_id).await.unwrap_err().is_not_found());
    }
    assert!(!backend.is_member(&board_id, &member).await.unwrap());
    assert!(backend.boards_for_user(&member).await.unwrap().is_empty());

    // Other boards are untouched
    assert_eq!(backend.get_board(&other.id).await.unwrap(), other);
}
