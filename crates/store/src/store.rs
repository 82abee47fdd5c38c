use async_trait::async_trait;
use domain::{NewOrder, Order, OrderStatus, ProductRecord};

use crate::{OrderId, ProductId, Result, UserId};

/// Filter and page for listing orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderQuery {
    /// Only orders placed by this user.
    pub user_id: Option<UserId>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl OrderQuery {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            user_id: None,
            page,
            per_page,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// One page of orders plus the total number matching the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
}

/// Durable persistence of orders and their status transitions.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order in Pending state.
    ///
    /// Assigns the id and timestamps. Once this returns the order is
    /// discoverable through [`OrderStore::get`].
    async fn create(&self, order: NewOrder) -> Result<Order>;

    /// Moves an order to `status`.
    ///
    /// Only Pending -> Success and Pending -> Failed are applied. Repeating the
    /// current terminal status succeeds without a write. Anything else fails
    /// with `InvalidTransition`; a missing order fails with `OrderNotFound`.
    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        failure_reason: Option<String>,
    ) -> Result<Order>;

    /// Records the payment id returned by the payment authority.
    async fn record_payment(&self, order_id: OrderId, payment_id: &str) -> Result<()>;

    /// Loads an order by id.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists orders oldest first.
    async fn list(&self, query: OrderQuery) -> Result<OrderPage>;
}

/// Row-level access to product stock.
///
/// Quantity changes only through [`InventoryStore::compare_and_swap_quantity`];
/// the reservation algorithm built on top lives in [`crate::InventoryLedger`].
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Reads the current product row.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>>;

    /// Sets quantity to `new` only if it still equals `expected`.
    ///
    /// Returns false when the row changed since it was read (or vanished).
    async fn compare_and_swap_quantity(
        &self,
        product_id: ProductId,
        expected: u64,
        new: u64,
    ) -> Result<bool>;
}

#[async_trait]
impl<T: InventoryStore + ?Sized> InventoryStore for std::sync::Arc<T> {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        (**self).get_product(product_id).await
    }

    async fn compare_and_swap_quantity(
        &self,
        product_id: ProductId,
        expected: u64,
        new: u64,
    ) -> Result<bool> {
        (**self)
            .compare_and_swap_quantity(product_id, expected, new)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_is_zero_based_from_page_one() {
        assert_eq!(OrderQuery::new(1, 10).offset(), 0);
        assert_eq!(OrderQuery::new(3, 10).offset(), 20);
        assert_eq!(OrderQuery::new(0, 10).offset(), 0);
    }
}
