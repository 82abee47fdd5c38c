use domain::{DomainError, OrderStatus};
use thiserror::Error;

use crate::{OrderId, ProductId};

/// Errors that can occur when interacting with the order store or inventory.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order exists with this id.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// No inventory row exists for this product.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The stored status does not allow the requested change.
    #[error("Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// A reservation must take at least one unit.
    #[error("Invalid reservation count: {0}")]
    InvalidCount(u64),

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A value does not fit the column type.
    #[error("Value {value} out of range for column {column}")]
    OutOfRange { column: &'static str, value: u64 },

    /// A stored row could not be mapped back to a domain record.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl StoreError {
    pub(crate) fn from_domain(order_id: OrderId, err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { from, to } => StoreError::InvalidTransition {
                order_id,
                from,
                to,
            },
            other => StoreError::CorruptRow(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
