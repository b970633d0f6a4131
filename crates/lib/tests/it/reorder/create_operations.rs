use kanban_rank::{NewCard, Placement, RANK_GAP};

use crate::helpers::*;

#[tokio::test]
async fn test_create_appends_at_tail() {
    let reorderer = test_reorderer().await;
    let (board_id, owner) = board(&reorderer).await;
    let list_ids = lists(&reorderer, &owner, board_id, 4).await;

    let order = list_order(reorderer.backend(), &board_id).await;
    let expected: Vec<_> = list_ids
        .iter()
        .zip([1000, 2000, 3000, 4000])
        .map(|(id, rank)| (*id, rank))
        .collect();
    assert_eq!(order, expected);
}

#[tokio::test]
async fn test_create_first_in_empty_scope() {
    let reorderer = test_reorderer().await;
    let (board_id, owner) = board(&reorderer).await;

    let outcome = reorderer
        .create_list(&owner, board_id, "Backlog", Placement::tail())
        .await
        .unwrap();
    assert_eq!(outcome.rank, RANK_GAP);
    assert!(!outcome.reindexed);

    let list = outcome.entity.as_list().unwrap();
    assert_eq!(list.title, "Backlog");
    assert_eq!(list.board_id, board_id);
}

#[tokio::test]
async fn test_create_between_neighbours() {
    let reorderer = test_reorderer().await;
    let (_board_id, owner, list_id, card_ids) = board_with_cards(&reorderer, 2).await;

    let between = reorderer
        .create_card(
            &owner,
            list_id,
            &NewCard::new("Middle", owner),
            Placement::between(Some(card_ids[0]), Some(card_ids[1])),
        )
        .await
        .unwrap();
    assert_eq!(between.rank, 1500);

    let head = reorderer
        .create_card(
            &owner,
            list_id,
            &NewCard::new("Head", owner),
            Placement::between(None, Some(card_ids[0])),
        )
        .await
        .unwrap();
    assert_eq!(head.rank, 500);

    let order = card_order(reorderer.backend(), &list_id).await;
    assert_eq!(
        order,
        vec![
            (head.entity.id(), 500),
            (card_ids[0], 1000),
            (between.entity.id(), 1500),
            (card_ids[1], 2000),
        ]
    );
}

#[tokio::test]
async fn test_create_between_adjacent_ranks_reindexes() {
    let reorderer = test_reorderer().await;
    let (_board_id, owner, list_id, card_ids) = board_with_cards(&reorderer, 2).await;
    reorderer
        .move_card(&owner, card_ids[1], list_id, Placement::at(1001))
        .await
        .unwrap();

    let outcome = reorderer
        .create_card(
            &owner,
            list_id,
            &NewCard::new("Squeezed", owner),
            Placement::between(Some(card_ids[0]), Some(card_ids[1])),
        )
        .await
        .unwrap();
    assert!(outcome.reindexed);
    assert_eq!(outcome.rank, 1500);

    let order = card_order(reorderer.backend(), &list_id).await;
    assert_eq!(
        order,
        vec![
            (card_ids[0], 1000),
            (outcome.entity.id(), 1500),
            (card_ids[1], 2000),
        ]
    );
}

#[tokio::test]
async fn test_create_in_missing_scope() {
    let reorderer = test_reorderer().await;
    let owner = uuid::Uuid::new_v4();

    let err = reorderer
        .create_card(
            &owner,
            uuid::Uuid::new_v4(),
            &NewCard::new("Orphan", owner),
            Placement::tail(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = reorderer
        .create_list(&owner, uuid::Uuid::new_v4(), "Orphan", Placement::tail())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
