//! Order-fulfillment orchestration.
//!
//! [`OrderOrchestrator`] drives one purchase from request to a terminal order:
//! 1. Look up the user and the product
//! 2. Price the order and persist it as Pending
//! 3. Charge the payment authority
//! 4. Reserve stock through the inventory ledger
//! 5. Finalize the order and publish a reward event
//!
//! A reservation that fails after a successful charge refunds the payment.
//! Every remote step runs under a deadline.

pub mod error;
pub mod orchestrator;
pub mod services;
pub mod steps;

pub use error::{FulfillmentError, Result};
pub use orchestrator::{CreateOrderRequest, FulfillmentConfig, OrderOrchestrator};
pub use services::{
    ChargeRequest, EventPublisher, InMemoryEventPublisher, InMemoryPaymentAuthority,
    InMemoryUserDirectory, LedgerProductCatalog, PaymentAuthority, ProductCatalog, ProductView,
    RewardMessage, UserDirectory, UserProfile, topology,
};

#[cfg(feature = "kafka")]
pub use services::KafkaEventPublisher;
