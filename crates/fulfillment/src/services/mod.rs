//! Collaborator contracts the orchestrator calls, with in-memory implementations.

pub mod catalog;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod payment;
pub mod publisher;
pub mod users;

pub use catalog::{LedgerProductCatalog, ProductCatalog, ProductView};
#[cfg(feature = "kafka")]
pub use kafka::KafkaEventPublisher;
pub use payment::{ChargeRequest, InMemoryPaymentAuthority, PaymentAuthority};
pub use publisher::{EventPublisher, InMemoryEventPublisher, RewardMessage, topology};
pub use users::{InMemoryUserDirectory, UserDirectory, UserProfile};
