use kanban_rank::{
    Backend, EntityKind, NewCard, Scope,
    backend::BackendError,
};
use uuid::Uuid;

use crate::helpers::*;

#[tokio::test]
async fn test_writes_visible_after_commit() {
    let backend = Backend::from(test_backend().await);
    let owner = Uuid::new_v4();
    let board = backend.create_empty_board("Board", owner).await.unwrap();

    let mut txn = backend.begin_scope(&Scope::Board(board.id)).await.unwrap();
    assert_eq!(txn.board_id(), board.id);
    assert_eq!(*txn.scope(), Scope::Board(board.id));

    let second = txn.insert_list("Second", 2000).await.unwrap();
    let first = txn.insert_list("First", 1000).await.unwrap();

    // Reads inside the transaction see its own writes, in rank order
    let siblings = txn.siblings_by_rank().await.unwrap();
    let ids: Vec<Uuid> = siblings.iter().map(|entity| entity.id()).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    txn.commit().await.unwrap();

    let order = list_order(&backend, &board.id).await;
    assert_eq!(order, vec![(first.id, 1000), (second.id, 2000)]);

    // Opening the scope bumped the board's bookkeeping
    let board_after = backend.get_board(&board.id).await.unwrap();
    assert_eq!(board_after.version, board.version + 1);
    assert!(board_after.updated_at > board.updated_at);
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let backend = in_memory_backend();
    let owner = Uuid::new_v4();
    let board = backend.create_empty_board("Board", owner).await.unwrap();

    {
        let mut txn = backend.begin_scope(&Scope::Board(board.id)).await.unwrap();
        txn.insert_list("Never committed", 1000).await.unwrap();
        // Not visible to readers outside the transaction
        assert!(backend.lists_in_board(&board.id).await.unwrap().is_empty());
    }

    assert!(backend.lists_in_board(&board.id).await.unwrap().is_empty());
    let board_after = backend.get_board(&board.id).await.unwrap();
    assert_eq!(board_after.version, board.version);
}

#[tokio::test]
async fn test_update_rank_bumps_version_once() {
    let reorderer = test_reorderer().await;
    let (_board_id, _owner, list_id, card_ids) = board_with_cards(&reorderer, 2).await;
    let backend = reorderer.backend();

    let mut txn = backend.begin_scope(&Scope::List(list_id)).await.unwrap();
    txn.update_rank(EntityKind::Card, card_ids[0], 1500, None)
        .await
        .unwrap();
    let updated = txn
        .update_rank(EntityKind::Card, card_ids[0], 2500, None)
        .await
        .unwrap();
    assert_eq!(updated.rank(), 2500);
    txn.commit().await.unwrap();

    let card = backend.get_card(&card_ids[0]).await.unwrap();
    assert_eq!(card.rank, 2500);
    assert_eq!(card.version, 2);

    let order = card_order(backend, &list_id).await;
    assert_eq!(order, vec![(card_ids[1], 2000), (card_ids[0], 2500)]);
}

#[tokio::test]
async fn test_update_rank_reparents_card() {
    let reorderer = test_reorderer().await;
    let (board_id, owner) = board(&reorderer).await;
    let list_ids = lists(&reorderer, &owner, board_id, 2).await;
    let card_id = cards(&reorderer, &owner, list_ids[0], 1).await[0];
    let backend = reorderer.backend();

    let target = Scope::List(list_ids[1]);
    let mut txn = backend.begin_scope(&target).await.unwrap();
    let moved = txn
        .update_rank(EntityKind::Card, card_id, 1000, Some(&target))
        .await
        .unwrap();
    assert_eq!(moved.scope(), target);
    txn.commit().await.unwrap();

    assert!(card_order(backend, &list_ids[0]).await.is_empty());
    assert_eq!(card_order(backend, &list_ids[1]).await, vec![(card_id, 1000)]);
}

#[tokio::test]
async fn test_bulk_update_rejects_rows_outside_scope() {
    let reorderer = test_reorderer().await;
    let (board_id, owner) = board(&reorderer).await;
    let list_ids = lists(&reorderer, &owner, board_id, 2).await;
    let card_id = cards(&reorderer, &owner, list_ids[0], 1).await[0];
    let backend = reorderer.backend();

    let mut txn = backend.begin_scope(&Scope::List(list_ids[1])).await.unwrap();
    let result = txn.bulk_update_ranks(&[(card_id, 5000)]).await;
    assert!(result.is_err());
    drop(txn);

    let card = backend.get_card(&card_id).await.unwrap();
    assert_eq!(card.rank, 1000);
}

#[tokio::test]
async fn test_insert_kind_must_match_scope() {
    let backend = in_memory_backend();
    let owner = Uuid::new_v4();
    let board = backend.create_empty_board("Board", owner).await.unwrap();

    let mut txn = backend.begin_scope(&Scope::Board(board.id)).await.unwrap();
    let err = txn
        .insert_card(&NewCard::new("Misplaced", owner), 1000)
        .await
        .unwrap_err();
    assert!(err.is_integrity_error());
}

#[tokio::test]
async fn test_same_scope_transactions_serialize() {
    let backend = in_memory_backend();
    let owner = Uuid::new_v4();
    let board = backend.create_empty_board("Board", owner).await.unwrap();
    let scope = Scope::Board(board.id);

    let mut first = backend.begin_scope(&scope).await.unwrap();

    // A second transaction on the same scope waits for the first one
    let waiting = {
        let backend = backend.clone();
        tokio::spawn(async move {
            let mut txn = backend.begin_scope(&scope).await.unwrap();
            let siblings = txn.siblings_by_rank().await.unwrap();
            txn.commit().await.unwrap();
            siblings.len()
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!waiting.is_finished());

    // Another scope is not blocked
    let other = backend.create_empty_board("Other", owner).await.unwrap();
    let other_txn = backend.begin_scope(&Scope::Board(other.id)).await.unwrap();
    other_txn.commit().await.unwrap();

    first.insert_list("Inserted first", 1000).await.unwrap();
    first.commit().await.unwrap();

    // The waiting transaction observes the committed insert
    assert_eq!(waiting.await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_move_out_of_scope_conflicts() {
    let reorderer = reorderer_for(in_memory_backend());
    let (board_id, owner) = board(&reorderer).await;
    let list_ids = lists(&reorderer, &owner, board_id, 2).await;
    let card_id = cards(&reorderer, &owner, list_ids[0], 1).await[0];
    let backend = reorderer.backend();

    // Renumber the card inside its current list...
    let mut stale = backend.begin_scope(&Scope::List(list_ids[0])).await.unwrap();
    stale.bulk_update_ranks(&[(card_id, 7000)]).await.unwrap();

    // ...while another transaction moves it to the second list
    let target = Scope::List(list_ids[1]);
    let mut mover = backend.begin_scope(&target).await.unwrap();
    mover
        .update_rank(EntityKind::Card, card_id, 1000, Some(&target))
        .await
        .unwrap();
    mover.commit().await.unwrap();

    let err = stale.commit().await.unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
        err,
        kanban_rank::Error::Backend(BackendError::WriteConflict { id, .. }) if id == card_id
    ));

    // The move survived
    let card = backend.get_card(&card_id).await.unwrap();
    assert_eq!(card.list_id, list_ids[1]);
    assert_eq!(card.rank, 1000);
}

#[tokio::test]
async fn test_title_edit_survives_open_rank_transaction() {
    let reorderer = reorderer_for(in_memory_backend());
    let (_board_id, _owner, list_id, card_ids) = board_with_cards(&reorderer, 2).await;
    let backend = reorderer.backend();

    let mut txn = backend.begin_scope(&Scope::List(list_id)).await.unwrap();
    txn.bulk_update_ranks(&[(card_ids[0], 500)]).await.unwrap();

    // Edited outside the scope lock while the transaction is open
    let edited = backend
        .update_card(
            &card_ids[0],
            &kanban_rank::CardUpdate {
                title: Some("Edited".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();
    txn.commit().await.unwrap();

    let card = backend.get_card(&card_ids[0]).await.unwrap();
    assert_eq!(card.title, "Edited");
    assert_eq!(card.rank, 500);
    assert_eq!(card.version, edited.version + 1);
}
