//! Order record, state machine and value objects.

mod model;
mod state;
mod value_objects;

pub use model::{NewOrder, Order};
pub use state::OrderStatus;
pub use value_objects::Money;
