//! Compare-and-swap inventory reservations.

use domain::ProductRecord;

use crate::retry::RetryPolicy;
use crate::store::InventoryStore;
use crate::{ProductId, Result, StoreError};

/// Outcome of a reservation attempt.
///
/// `InsufficientStock` and `Conflict` are business rejections, not errors:
/// the caller fails the order and reports it normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// Units were taken; `remaining` is the quantity left after the swap.
    Reserved { remaining: u64 },
    /// Fewer than the requested units were available when read.
    InsufficientStock { available: u64 },
    /// Every attempt lost its compare-and-swap to a concurrent reservation.
    Conflict,
}

impl Reservation {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Reservation::Reserved { .. })
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Reservation::Reserved { .. } => "reserved",
            Reservation::InsufficientStock { .. } => "insufficient_stock",
            Reservation::Conflict => "conflict",
        }
    }
}

/// Guarantees at-most-available decrements under concurrent callers.
///
/// Each attempt reads the row, checks the stock, and writes the decrement
/// conditioned on the quantity it read. No lock is held between the read and
/// the write; a lost race is retried per the [`RetryPolicy`] with a fresh read.
pub struct InventoryLedger<S: InventoryStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: InventoryStore> InventoryLedger<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads the current product row.
    pub async fn product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        self.store.get_product(product_id).await
    }

    /// Reserves `count` units of `product_id`.
    #[tracing::instrument(skip(self), fields(attempts = tracing::field::Empty))]
    pub async fn reserve(&self, product_id: ProductId, count: u64) -> Result<Reservation> {
        if count == 0 {
            return Err(StoreError::InvalidCount(count));
        }

        let mut attempt: u32 = 0;
        let reservation = loop {
            let product = self
                .store
                .get_product(product_id)
                .await?
                .ok_or(StoreError::ProductNotFound(product_id))?;

            if !product.has_stock_for(count) {
                break Reservation::InsufficientStock {
                    available: product.quantity,
                };
            }

            let remaining = product.quantity - count;
            if self
                .store
                .compare_and_swap_quantity(product_id, product.quantity, remaining)
                .await?
            {
                break Reservation::Reserved { remaining };
            }

            metrics::counter!("inventory_reservation_conflicts_total").increment(1);
            if !self.retry.should_retry(attempt) {
                tracing::warn!(%product_id, attempt, "reservation lost every compare-and-swap");
                break Reservation::Conflict;
            }

            let delay = self.retry.delay_for_attempt(attempt);
            tracing::debug!(
                %product_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reservation conflict, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        tracing::Span::current().record("attempts", attempt + 1);
        metrics::counter!("inventory_reservations_total", "outcome" => reservation.outcome())
            .increment(1);
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use domain::Money;

    use super::*;
    use crate::memory::InMemoryInventoryStore;

    /// Wraps a store and makes the first `losses` swaps report a lost race,
    /// after stealing one unit as a competing buyer would.
    struct ContendedStore {
        inner: InMemoryInventoryStore,
        losses: AtomicU32,
        swaps: AtomicU32,
    }

    #[async_trait]
    impl InventoryStore for ContendedStore {
        async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
            self.inner.get_product(product_id).await
        }

        async fn compare_and_swap_quantity(
            &self,
            product_id: ProductId,
            expected: u64,
            new: u64,
        ) -> Result<bool> {
            self.swaps.fetch_add(1, Ordering::SeqCst);
            if self.losses.load(Ordering::SeqCst) > 0 {
                self.losses.fetch_sub(1, Ordering::SeqCst);
                self.inner
                    .compare_and_swap_quantity(product_id, expected, expected - 1)
                    .await?;
                return Ok(false);
            }
            self.inner
                .compare_and_swap_quantity(product_id, expected, new)
                .await
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy::with_retries(max_retries, Duration::from_millis(1))
    }

    async fn seeded(quantity: u64) -> InMemoryInventoryStore {
        let store = InMemoryInventoryStore::new();
        store
            .insert_product(ProductRecord::new(
                ProductId::new(1),
                "Widget",
                Money::from_units(100),
                quantity,
            ))
            .await;
        store
    }

    #[tokio::test]
    async fn test_reserve_decrements() {
        let ledger = InventoryLedger::new(seeded(10).await, RetryPolicy::none());

        let result = ledger.reserve(ProductId::new(1), 3).await.unwrap();
        assert_eq!(result, Reservation::Reserved { remaining: 7 });
        assert_eq!(ledger.store().quantity(ProductId::new(1)).await, Some(7));
    }

    #[tokio::test]
    async fn test_reserve_exact_stock() {
        let ledger = InventoryLedger::new(seeded(4).await, RetryPolicy::none());
        let result = ledger.reserve(ProductId::new(1), 4).await.unwrap();
        assert_eq!(result, Reservation::Reserved { remaining: 0 });
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_not_an_error() {
        let ledger = InventoryLedger::new(seeded(0).await, RetryPolicy::none());

        let result = ledger.reserve(ProductId::new(1), 1).await.unwrap();
        assert_eq!(result, Reservation::InsufficientStock { available: 0 });
        assert!(!result.is_reserved());
        assert_eq!(ledger.store().quantity(ProductId::new(1)).await, Some(0));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let ledger = InventoryLedger::new(InMemoryInventoryStore::new(), RetryPolicy::none());
        let err = ledger.reserve(ProductId::new(9), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound(id) if id == ProductId::new(9)));
    }

    #[tokio::test]
    async fn test_zero_count_rejected() {
        let ledger = InventoryLedger::new(seeded(5).await, RetryPolicy::none());
        let err = ledger.reserve(ProductId::new(1), 0).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCount(0)));
    }

    #[tokio::test]
    async fn test_conflict_without_retry() {
        let store = Arc::new(ContendedStore {
            inner: seeded(10).await,
            losses: AtomicU32::new(1),
            swaps: AtomicU32::new(0),
        });
        let ledger = InventoryLedger::new(store.clone(), RetryPolicy::none());

        let result = ledger.reserve(ProductId::new(1), 2).await.unwrap();
        assert_eq!(result, Reservation::Conflict);
        assert_eq!(store.swaps.load(Ordering::SeqCst), 1);
        // only the competing buyer's unit is gone
        assert_eq!(store.inner.quantity(ProductId::new(1)).await, Some(9));
    }

    #[tokio::test]
    async fn test_conflict_retried_with_fresh_read() {
        let store = Arc::new(ContendedStore {
            inner: seeded(10).await,
            losses: AtomicU32::new(2),
            swaps: AtomicU32::new(0),
        });
        let ledger = InventoryLedger::new(store.clone(), fast_retry(3));

        let result = ledger.reserve(ProductId::new(1), 2).await.unwrap();
        // two competing units, then our two
        assert_eq!(result, Reservation::Reserved { remaining: 6 });
        assert_eq!(store.swaps.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_reports_insufficient_stock_after_reread() {
        let store = Arc::new(ContendedStore {
            inner: seeded(2).await,
            losses: AtomicU32::new(1),
            swaps: AtomicU32::new(0),
        });
        let ledger = InventoryLedger::new(store.clone(), fast_retry(3));

        let result = ledger.reserve(ProductId::new(1), 2).await.unwrap();
        assert_eq!(result, Reservation::InsufficientStock { available: 1 });
        assert_eq!(store.swaps.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conflict_after_exhausting_retries() {
        let store = Arc::new(ContendedStore {
            inner: seeded(100).await,
            losses: AtomicU32::new(10),
            swaps: AtomicU32::new(0),
        });
        let ledger = InventoryLedger::new(store.clone(), fast_retry(2));

        let result = ledger.reserve(ProductId::new(1), 1).await.unwrap();
        assert_eq!(result, Reservation::Conflict);
        assert_eq!(store.swaps.load(Ordering::SeqCst), 3);
    }
}
