//! Concurrent reservations against a single product row.

use std::sync::Arc;
use std::time::Duration;

use domain::{Money, ProductRecord};
use futures_util::future::join_all;
use store::{InMemoryInventoryStore, InventoryLedger, ProductId, Reservation, RetryPolicy};

async fn ledger_with_stock(
    quantity: u64,
    retry: RetryPolicy,
) -> Arc<InventoryLedger<InMemoryInventoryStore>> {
    let store = InMemoryInventoryStore::new();
    store
        .insert_product(ProductRecord::new(
            ProductId::new(1),
            "Widget",
            Money::from_units(100),
            quantity,
        ))
        .await;
    Arc::new(InventoryLedger::new(store, retry))
}

async fn reserve_concurrently(
    ledger: &Arc<InventoryLedger<InMemoryInventoryStore>>,
    counts: &[u64],
) -> Vec<(u64, Reservation)> {
    let handles = counts.iter().map(|&count| {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            let result = ledger.reserve(ProductId::new(1), count).await.unwrap();
            (count, result)
        })
    });

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_buyers_of_six_against_ten() {
    let ledger = ledger_with_stock(10, RetryPolicy::default()).await;

    let results = reserve_concurrently(&ledger, &[6, 6]).await;

    let reserved: Vec<_> = results.iter().filter(|(_, r)| r.is_reserved()).collect();
    assert_eq!(reserved.len(), 1);
    assert!(results.iter().any(|(_, r)| matches!(
        r,
        Reservation::InsufficientStock { .. } | Reservation::Conflict
    )));
    assert_eq!(ledger.store().quantity(ProductId::new(1)).await, Some(4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_reserved_total_never_exceeds_stock() {
    for (initial, counts) in [
        (10u64, vec![1u64; 25]),
        (17, vec![3, 5, 2, 7, 1, 4, 6, 2, 3, 1, 8]),
        (0, vec![1, 2, 3]),
        (50, (1..=12).collect::<Vec<_>>()),
    ] {
        let ledger = ledger_with_stock(initial, RetryPolicy::default()).await;

        let results = reserve_concurrently(&ledger, &counts).await;

        let reserved: u64 = results
            .iter()
            .filter(|(_, r)| r.is_reserved())
            .map(|(count, _)| count)
            .sum();
        let remaining = ledger.store().quantity(ProductId::new(1)).await.unwrap();

        assert!(reserved <= initial, "reserved {reserved} of {initial}");
        assert_eq!(initial - reserved, remaining);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_without_retry_losers_report_conflict_not_oversell() {
    let ledger = ledger_with_stock(100, RetryPolicy::none()).await;

    let results = reserve_concurrently(&ledger, &[1; 40]).await;

    let reserved = results.iter().filter(|(_, r)| r.is_reserved()).count() as u64;
    let conflicts = results
        .iter()
        .filter(|(_, r)| *r == Reservation::Conflict)
        .count() as u64;

    assert_eq!(reserved + conflicts, 40);
    assert_eq!(
        ledger.store().quantity(ProductId::new(1)).await,
        Some(100 - reserved)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_generous_retry_serves_every_buyer_with_stock() {
    let retry = RetryPolicy {
        max_retries: 200,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        multiplier: 1.0,
    };
    let ledger = ledger_with_stock(20, retry).await;

    let results = reserve_concurrently(&ledger, &[1; 20]).await;

    assert!(results.iter().all(|(_, r)| r.is_reserved()));
    assert_eq!(ledger.store().quantity(ProductId::new(1)).await, Some(0));
}
