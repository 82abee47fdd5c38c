//! Reward-accrual message emitted after a successful order.

use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::order::{Money, Order};

/// Body of the reward message: `{"order_id", "user_id", "amount"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
}

impl RewardEvent {
    /// Builds the reward for a completed order.
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            amount: order.amount,
        }
    }

    /// Key consumers use to drop redelivered messages.
    pub fn idempotency_key(&self) -> String {
        self.order_id.to_string()
    }
}
