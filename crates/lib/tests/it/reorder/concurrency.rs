//! Concurrent placement. These race many transactions against each other and
//! always run on the InMemory backend.

use std::collections::HashSet;

use kanban_rank::{NewCard, Placement};

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_moves_on_disjoint_scopes_both_succeed() {
    let reorderer = reorderer_for(in_memory_backend());
    let (_, owner_a, list_a, cards_a) = board_with_cards(&reorderer, 3).await;
    let (_, owner_b, list_b, cards_b) = board_with_cards(&reorderer, 3).await;

    let (moved_a, moved_b) = tokio::join!(
        reorderer.move_card(
            &owner_a,
            cards_a[2],
            list_a,
            Placement::between(None, Some(cards_a[0])),
        ),
        reorderer.move_card(
            &owner_b,
            cards_b[0],
            list_b,
            Placement::between(Some(cards_b[1]), Some(cards_b[2])),
        ),
    );

    assert_eq!(moved_a.unwrap().rank, 500);
    assert_eq!(moved_b.unwrap().rank, 2500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_never_collide() {
    let reorderer = reorderer_for(in_memory_backend());
    let (board_id, owner) = board(&reorderer).await;
    let list_id = lists(&reorderer, &owner, board_id, 1).await[0];

    let mut handles = Vec::new();
    for i in 0..24 {
        let reorderer = reorderer.clone();
        handles.push(tokio::spawn(async move {
            reorderer
                .create_card(
                    &owner,
                    list_id,
                    &NewCard::new(format!("Card {i}"), owner),
                    Placement::tail(),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let order = card_order(reorderer.backend(), &list_id).await;
    assert_eq!(order.len(), 24);
    let ranks: Vec<_> = order.iter().map(|(_, rank)| *rank).collect();
    let expected: Vec<_> = (1..=24).map(|i| i * 1000).collect();
    assert_eq!(ranks, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_in_same_scope_keep_ranks_unique() {
    let reorderer = reorderer_for(in_memory_backend());
    let (_board_id, owner, list_id, card_ids) = board_with_cards(&reorderer, 16).await;
    let (moved, stayed) = card_ids.split_at(8);

    // Half of the cards race to the tail while the scope is being reindexed
    let mut moves = Vec::new();
    for card_id in moved.iter().copied() {
        let reorderer = reorderer.clone();
        moves.push(tokio::spawn(async move {
            reorderer
                .move_card(&owner, card_id, list_id, Placement::tail())
                .await
        }));
    }
    let mut reindexes = Vec::new();
    for _ in 0..4 {
        let reorderer = reorderer.clone();
        reindexes.push(tokio::spawn(async move {
            reorderer
                .reindex_scope(&owner, kanban_rank::Scope::List(list_id))
                .await
        }));
    }
    for handle in moves {
        handle.await.unwrap().unwrap();
    }
    for handle in reindexes {
        handle.await.unwrap().unwrap();
    }

    let order = card_order(reorderer.backend(), &list_id).await;
    assert_eq!(order.len(), 16);
    assert_strictly_increasing(&order);
    let unique: HashSet<_> = order.iter().map(|(_, rank)| *rank).collect();
    assert_eq!(unique.len(), 16);

    // Cards that did not move keep their relative order at the front
    let front: Vec<_> = order[..8].iter().map(|(id, _)| *id).collect();
    assert_eq!(front, stayed);
    let back: HashSet<_> = order[8..].iter().map(|(id, _)| *id).collect();
    assert_eq!(back, moved.iter().copied().collect());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cross_list_moves() {
    let reorderer = reorderer_for(in_memory_backend());
    let (board_id, owner) = board(&reorderer).await;
    let list_ids = lists(&reorderer, &owner, board_id, 2).await;
    let left = cards(&reorderer, &owner, list_ids[0], 8).await;
    let right = cards(&reorderer, &owner, list_ids[1], 8).await;

    // Swap every card to the other list's tail at the same time
    let mut handles = Vec::new();
    for (card_id, target) in left
        .iter()
        .map(|id| (*id, list_ids[1]))
        .chain(right.iter().map(|id| (*id, list_ids[0])))
    {
        let reorderer = reorderer.clone();
        handles.push(tokio::spawn(async move {
            reorderer
                .move_card(&owner, card_id, target, Placement::tail())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let backend = reorderer.backend();
    let left_after = card_order(backend, &list_ids[0]).await;
    let right_after = card_order(backend, &list_ids[1]).await;
    assert_strictly_increasing(&left_after);
    assert_strictly_increasing(&right_after);

    let left_ids: HashSet<_> = left_after.iter().map(|(id, _)| *id).collect();
    let right_ids: HashSet<_> = right_after.iter().map(|(id, _)| *id).collect();
    assert_eq!(left_ids, right.iter().copied().collect());
    assert_eq!(right_ids, left.iter().copied().collect());
}
