use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use domain::{NewOrder, Order, OrderStatus, ProductRecord};
use tokio::sync::RwLock;

use crate::{
    OrderId, ProductId, Result, StoreError,
    store::{InventoryStore, OrderPage, OrderQuery, OrderStore},
};

#[derive(Default)]
struct OrderTable {
    orders: HashMap<OrderId, Order>,
    /// Every status each order has held, in write order.
    history: HashMap<OrderId, Vec<OrderStatus>>,
}

/// In-memory order store for testing and single-process runs.
///
/// Provides the same interface and transition rules as the PostgreSQL
/// implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    table: Arc<RwLock<OrderTable>>,
    fail_on_create: Arc<AtomicBool>,
    fail_on_update: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create` fail as if the database were unreachable.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Makes `update_status` and `record_payment` fail as if the database were unreachable.
    pub fn set_fail_on_update(&self, fail: bool) {
        self.fail_on_update.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.table.read().await.orders.len()
    }

    /// Returns every status the order has held, starting with Pending.
    pub async fn status_history(&self, order_id: OrderId) -> Vec<OrderStatus> {
        self.table
            .read()
            .await
            .history
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{operation} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: NewOrder) -> Result<Order> {
        Self::check(&self.fail_on_create, "create")?;

        let order = Order::pending(OrderId::new(), order, Utc::now());
        let mut table = self.table.write().await;
        table.history.insert(order.id, vec![order.status]);
        table.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        failure_reason: Option<String>,
    ) -> Result<Order> {
        Self::check(&self.fail_on_update, "update_status")?;

        let mut table = self.table.write().await;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        let changed = order
            .transition(status, failure_reason, Utc::now())
            .map_err(|e| StoreError::from_domain(order_id, e))?;
        let order = order.clone();

        if changed {
            table.history.entry(order_id).or_default().push(status);
        }
        Ok(order)
    }

    async fn record_payment(&self, order_id: OrderId, payment_id: &str) -> Result<()> {
        Self::check(&self.fail_on_update, "record_payment")?;

        let mut table = self.table.write().await;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.payment_id = Some(payment_id.to_string());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.table.read().await.orders.get(&order_id).cloned())
    }

    async fn list(&self, query: OrderQuery) -> Result<OrderPage> {
        let table = self.table.read().await;
        let mut orders: Vec<_> = table
            .orders
            .values()
            .filter(|o| query.user_id.is_none_or(|user_id| o.user_id == user_id))
            .cloned()
            .collect();

        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = orders.len() as u64;
        let orders = orders
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .collect();

        Ok(OrderPage { orders, total })
    }
}

/// In-memory product stock for testing and single-process runs.
///
/// The write lock makes each compare-and-swap atomic; reads never block a
/// concurrent reservation for longer than one map lookup.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    products: Arc<RwLock<HashMap<ProductId, ProductRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryInventoryStore {
    /// Creates a new empty inventory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product row.
    pub async fn insert_product(&self, product: ProductRecord) {
        self.products.write().await.insert(product.id, product);
    }

    /// Returns the current quantity of a product.
    pub async fn quantity(&self, product_id: ProductId) -> Option<u64> {
        self.products
            .read()
            .await
            .get(&product_id)
            .map(|p| p.quantity)
    }

    /// Makes every call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("inventory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        self.check()?;
        Ok(self.products.read().await.get(&product_id).cloned())
    }

    async fn compare_and_swap_quantity(
        &self,
        product_id: ProductId,
        expected: u64,
        new: u64,
    ) -> Result<bool> {
        self.check()?;
        let mut products = self.products.write().await;
        match products.get_mut(&product_id) {
            Some(product) if product.quantity == expected => {
                product.quantity = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
