//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Success
///           └──► Failed
/// ```
///
/// Success and Failed are terminal. Re-applying the same terminal status is
/// accepted as a no-op so that a retried write stays idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order is written; payment and inventory have not resolved yet.
    #[default]
    Pending,

    /// Payment charged and inventory reserved (terminal state).
    Success,

    /// Payment declined, reservation rejected or a step failed (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Success | OrderStatus::Failed)
    }

    /// Returns true if moving to `next` is a real transition.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Success)
                | (OrderStatus::Pending, OrderStatus::Failed)
        )
    }

    /// Returns true if `next` is accepted: either a valid transition or an
    /// idempotent repeat of the current terminal status.
    pub fn accepts(&self, next: OrderStatus) -> bool {
        self.can_transition_to(next) || (self.is_terminal() && *self == next)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Success => "success",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "success" => Ok(OrderStatus::Success),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}
