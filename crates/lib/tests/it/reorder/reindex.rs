use kanban_rank::{Placement, Scope, rank::rank_between, reorder::reindex};

use crate::helpers::*;

#[tokio::test]
async fn test_reindex_scope_restores_gaps() {
    let reorderer = test_reorderer().await;
    let (_board_id, owner, list_id, card_ids) = board_with_cards(&reorderer, 4).await;

    // Crowd the ranks without changing order
    for (card_id, rank) in card_ids.iter().zip([10, 11, 12, 5000]) {
        reorderer
            .move_card(&owner, *card_id, list_id, Placement::at(rank))
            .await
            .unwrap();
    }

    let renumbered = reorderer
        .reindex_scope(&owner, Scope::List(list_id))
        .await
        .unwrap();
    assert_eq!(renumbered, 4);

    let order = card_order(reorderer.backend(), &list_id).await;
    let expected: Vec<_> = card_ids
        .iter()
        .zip([1000, 2000, 3000, 4000])
        .map(|(id, rank)| (*id, rank))
        .collect();
    assert_eq!(order, expected);

    // Every adjacent pair has room again
    for pair in order.windows(2) {
        assert!(rank_between(Some(pair[0].1), Some(pair[1].1)).is_some());
    }

    // Already gapped: nothing to rewrite
    let renumbered = reorderer
        .reindex_scope(&owner, Scope::List(list_id))
        .await
        .unwrap();
    assert_eq!(renumbered, 0);
}

#[tokio::test]
async fn test_reindex_skips_members_already_in_place() {
    let reorderer = test_reorderer().await;
    let (board_id, owner) = board(&reorderer).await;
    let list_ids = lists(&reorderer, &owner, board_id, 3).await;
    reorderer
        .move_list(&owner, list_ids[2], board_id, Placement::at(2001))
        .await
        .unwrap();

    let renumbered = reorderer
        .reindex_scope(&owner, Scope::Board(board_id))
        .await
        .unwrap();
    assert_eq!(renumbered, 1);
    assert_eq!(
        list_order(reorderer.backend(), &board_id).await,
        vec![(list_ids[0], 1000), (list_ids[1], 2000), (list_ids[2], 3000)]
    );
}

#[tokio::test]
async fn test_reindex_breaks_ties_by_creation_order() {
    let reorderer = test_reorderer().await;
    let (_board_id, owner, list_id, card_ids) = board_with_cards(&reorderer, 3).await;
    for card_id in &card_ids {
        reorderer
            .move_card(&owner, *card_id, list_id, Placement::at(7))
            .await
            .unwrap();
    }

    reorderer
        .reindex_scope(&owner, Scope::List(list_id))
        .await
        .unwrap();

    let order = card_order(reorderer.backend(), &list_id).await;
    assert_eq!(
        order,
        vec![(card_ids[0], 1000), (card_ids[1], 2000), (card_ids[2], 3000)]
    );
}

#[tokio::test]
async fn test_reindex_inside_open_transaction() {
    let reorderer = test_reorderer().await;
    let (_board_id, owner, list_id, card_ids) = board_with_cards(&reorderer, 2).await;
    reorderer
        .move_card(&owner, card_ids[1], list_id, Placement::at(1001))
        .await
        .unwrap();

    let backend = reorderer.backend();
    let mut txn = backend.begin_scope(&Scope::List(list_id)).await.unwrap();
    let renumbered = reindex(txn.as_mut()).await.unwrap();
    assert_eq!(renumbered, 1);

    let ranks: Vec<_> = txn
        .siblings_by_rank()
        .await
        .unwrap()
        .iter()
        .map(|entity| entity.rank())
        .collect();
    assert_eq!(ranks, vec![1000, 2000]);
    txn.commit().await.unwrap();

    assert_eq!(
        card_order(backend, &list_id).await,
        vec![(card_ids[0], 1000), (card_ids[1], 2000)]
    );
}

#[tokio::test]
async fn test_reindex_empty_scope() {
    let reorderer = test_reorderer().await;
    let (board_id, owner) = board(&reorderer).await;

    let renumbered = reorderer
        .reindex_scope(&owner, Scope::Board(board_id))
        .await
        .unwrap();
    assert_eq!(renumbered, 0);
}
