//! Domain layer for the order-fulfillment services.
//!
//! This crate provides the records the orchestrator moves between services:
//! - `Order` with its `OrderStatus` state machine (Pending -> Success | Failed)
//! - `Money` amounts in integer minor units
//! - `ProductRecord` inventory rows, `Payment` results and `RewardEvent` messages

pub mod error;
pub mod order;
pub mod payment;
pub mod product;
pub mod reward;

pub use common::{OrderId, ProductId, UserId};
pub use error::DomainError;
pub use order::{Money, NewOrder, Order, OrderStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use product::ProductRecord;
pub use reward::RewardEvent;
