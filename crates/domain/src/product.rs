//! Product inventory rows.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::order::Money;

/// A product's sellable stock and price.
///
/// `quantity` only ever decreases through a compare-and-swap reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u64,
}

impl ProductRecord {
    pub fn new(id: ProductId, name: impl Into<String>, unit_price: Money, quantity: u64) -> Self {
        Self {
            id,
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns true if `count` units can be taken from the current stock.
    pub fn has_stock_for(&self, count: u64) -> bool {
        self.quantity >= count
    }
}
