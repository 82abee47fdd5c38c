pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod retry;
pub mod store;

pub use common::{OrderId, ProductId, UserId};
pub use error::{Result, StoreError};
pub use ledger::{InventoryLedger, Reservation};
pub use memory::{InMemoryInventoryStore, InMemoryOrderStore};
pub use postgres::{PostgresInventoryStore, PostgresOrderStore, run_migrations};
pub use retry::RetryPolicy;
pub use store::{InventoryStore, OrderPage, OrderQuery, OrderStore};
