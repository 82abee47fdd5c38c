//! Product catalog trait and the ledger-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use domain::{Money, ProductRecord};
use serde::{Deserialize, Serialize};
use store::{InventoryLedger, InventoryStore, Reservation, StoreError};

use crate::error::{FulfillmentError, Result};

/// Price and stock of a product at lookup time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u64,
}

impl From<ProductRecord> for ProductView {
    fn from(record: ProductRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            unit_price: record.unit_price,
            quantity: record.quantity,
        }
    }
}

/// Trait for reading products and reserving their stock.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetches a product, failing with `NotFound` if it does not exist.
    async fn get(&self, product_id: ProductId) -> Result<ProductView>;

    /// Takes `count` units. Rejections come back as a [`Reservation`], not an error.
    async fn reserve_stock(&self, product_id: ProductId, count: u64) -> Result<Reservation>;
}

/// Catalog that reads and reserves through an [`InventoryLedger`].
pub struct LedgerProductCatalog<S: InventoryStore> {
    ledger: Arc<InventoryLedger<S>>,
}

impl<S: InventoryStore> LedgerProductCatalog<S> {
    pub fn new(ledger: Arc<InventoryLedger<S>>) -> Self {
        Self { ledger }
    }
}

fn map_store_error(err: StoreError) -> FulfillmentError {
    match err {
        StoreError::ProductNotFound(id) => FulfillmentError::NotFound(format!("product {id}")),
        StoreError::InvalidCount(count) => {
            FulfillmentError::Validation(format!("cannot reserve {count} units"))
        }
        other => FulfillmentError::UpstreamUnavailable(format!("inventory: {other}")),
    }
}

#[async_trait]
impl<S: InventoryStore + 'static> ProductCatalog for LedgerProductCatalog<S> {
    async fn get(&self, product_id: ProductId) -> Result<ProductView> {
        self.ledger
            .product(product_id)
            .await
            .map_err(map_store_error)?
            .map(ProductView::from)
            .ok_or_else(|| FulfillmentError::NotFound(format!("product {product_id}")))
    }

    async fn reserve_stock(&self, product_id: ProductId, count: u64) -> Result<Reservation> {
        self.ledger
            .reserve(product_id, count)
            .await
            .map_err(map_store_error)
    }
}
