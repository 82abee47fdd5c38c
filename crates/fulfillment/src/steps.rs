//! Step names used in spans, logs and failure reasons.

/// Look up the buyer in the user directory.
pub const LOOKUP_USER: &str = "lookup_user";

/// Fetch price and stock from the product catalog.
pub const LOOKUP_PRODUCT: &str = "lookup_product";

/// Charge the payment authority.
pub const CHARGE_PAYMENT: &str = "charge_payment";

/// Take units through the inventory ledger.
pub const RESERVE_STOCK: &str = "reserve_stock";

/// Refund a charge whose reservation did not go through.
pub const REFUND_PAYMENT: &str = "refund_payment";

/// Publish the reward-accrual event.
pub const PUBLISH_REWARD: &str = "publish_reward";
