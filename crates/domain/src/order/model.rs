//! Order records.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{Money, OrderStatus};
use crate::error::DomainError;

/// An order that has been priced but not yet persisted.
///
/// The amount is fixed here and never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub username: String,
    pub product_id: ProductId,
    pub product_count: u64,
    pub amount: Money,
}

impl NewOrder {
    /// Largest product count every order backend can store.
    pub const MAX_PRODUCT_COUNT: u64 = i64::MAX as u64;

    /// Prices an order as `unit_price × product_count`.
    pub fn priced(
        user_id: UserId,
        username: impl Into<String>,
        product_id: ProductId,
        product_count: u64,
        unit_price: Money,
    ) -> Result<Self, DomainError> {
        if product_count == 0 || product_count > Self::MAX_PRODUCT_COUNT {
            return Err(DomainError::InvalidQuantity(product_count));
        }
        let amount =
            unit_price
                .checked_multiply(product_count)
                .ok_or(DomainError::AmountOverflow {
                    unit_price,
                    count: product_count,
                })?;

        Ok(Self {
            user_id,
            username: username.into(),
            product_id,
            product_count,
            amount,
        })
    }
}

/// One purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub username: String,
    pub product_id: ProductId,
    pub product_count: u64,
    pub amount: Money,
    pub status: OrderStatus,
    /// Payment id returned by the payment authority, once charged.
    pub payment_id: Option<String>,
    /// Why the order ended Failed, or why a compensation did not complete.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materializes a freshly persisted order in Pending state.
    pub fn pending(id: OrderId, new: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            username: new.username,
            product_id: new.product_id,
            product_count: new.product_count,
            amount: new.amount,
            status: OrderStatus::Pending,
            payment_id: None,
            failure_reason: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Applies a status change.
    ///
    /// Returns `Ok(false)` when `next` repeats the current terminal status and
    /// nothing was changed.
    pub fn transition(
        &mut self,
        next: OrderStatus,
        failure_reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        if !self.status.accepts(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if self.status == next {
            return Ok(false);
        }

        self.status = next;
        if failure_reason.is_some() {
            self.failure_reason = failure_reason;
        }
        self.updated_at = at;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(count: u64, price: u64) -> Result<NewOrder, DomainError> {
        NewOrder::priced(
            UserId::new(1),
            "alice",
            ProductId::new(1),
            count,
            Money::from_units(price),
        )
    }

    #[test]
    fn test_amount_is_price_times_count() {
        let order = new_order(3, 100).unwrap();
        assert_eq!(order.amount, Money::from_units(300));
        assert_eq!(order.username, "alice");
    }

    #[test]
    fn test_zero_count_is_rejected() {
        assert_eq!(new_order(0, 100), Err(DomainError::InvalidQuantity(0)));
    }

    #[test]
    fn test_count_above_signed_range_is_rejected() {
        let count = NewOrder::MAX_PRODUCT_COUNT + 1;
        assert_eq!(new_order(count, 1), Err(DomainError::InvalidQuantity(count)));
    }

    #[test]
    fn test_overflowing_amount_is_rejected() {
        assert!(matches!(
            new_order(2, u64::MAX),
            Err(DomainError::AmountOverflow { count: 2, .. })
        ));
    }

    #[test]
    fn test_transition_to_terminal_and_repeat() {
        let created = Utc::now();
        let mut order = Order::pending(OrderId::new(), new_order(1, 100).unwrap(), created);
        assert_eq!(order.status, OrderStatus::Pending);

        let changed = order
            .transition(OrderStatus::Failed, Some("declined".into()), Utc::now())
            .unwrap();
        assert!(changed);
        assert_eq!(order.failure_reason.as_deref(), Some("declined"));

        let changed = order
            .transition(OrderStatus::Failed, None, Utc::now())
            .unwrap();
        assert!(!changed);
        assert_eq!(order.failure_reason.as_deref(), Some("declined"));
    }

    #[test]
    fn test_terminal_status_cannot_flip() {
        let mut order = Order::pending(OrderId::new(), new_order(1, 100).unwrap(), Utc::now());
        order
            .transition(OrderStatus::Success, None, Utc::now())
            .unwrap();

        let err = order
            .transition(OrderStatus::Failed, None, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: OrderStatus::Success,
                to: OrderStatus::Failed
            }
        );
        assert_eq!(order.status, OrderStatus::Success);
    }
}
