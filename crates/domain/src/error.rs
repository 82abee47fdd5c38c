//! Domain error types.

use thiserror::Error;

use crate::order::{Money, OrderStatus};

/// Errors raised by domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The requested status change is not allowed by the order state machine.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Product count must be at least one.
    #[error("Invalid product count: {0}")]
    InvalidQuantity(u64),

    /// unit price × count does not fit the amount type.
    #[error("Amount overflow: {unit_price} x {count}")]
    AmountOverflow { unit_price: Money, count: u64 },
}
