//! Fulfillment error types.

use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the orchestrator and its collaborators.
///
/// Insufficient stock and lost reservation races are not errors: they end
/// the order in Failed and are returned as a normal result.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The request was rejected before any remote call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A user or product does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A remote dependency could not be reached or missed its deadline.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The order store rejected a write or read.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The broker rejected the reward message or could not be reached.
    #[error("Publish error: {0}")]
    Publish(String),
}

impl FulfillmentError {
    /// Returns true for errors caused by the request rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FulfillmentError::Validation(_) | FulfillmentError::NotFound(_)
        )
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
