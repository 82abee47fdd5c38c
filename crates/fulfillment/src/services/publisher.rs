//! Reward event publishing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::RewardEvent;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{FulfillmentError, Result};

/// Broker topology for reward messages.
pub mod topology {
    /// Durable exchange the message is published to.
    pub const EXCHANGE: &str = "e_com_exchange";

    /// Exchange routing mode.
    pub const EXCHANGE_KIND: &str = "direct";

    /// Durable queue bound to the exchange; the topic name on Kafka.
    pub const QUEUE: &str = "payment_order_completed_queue";

    pub const ROUTING_KEY: &str = "payment_order_completed";

    pub const CONTENT_TYPE: &str = "application/json";
}

/// A reward event wrapped with its delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardMessage {
    /// Unique per publish attempt.
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// The order id. Stable across redeliveries, so consumers deduplicate on it.
    pub idempotency_key: String,
    pub exchange: &'static str,
    pub routing_key: &'static str,
    pub content_type: &'static str,
    pub persistent: bool,
    /// JSON `{"order_id", "user_id", "amount"}`.
    pub body: Vec<u8>,
}

impl RewardMessage {
    /// Wraps an event for publication.
    pub fn new(event: &RewardEvent) -> Result<Self> {
        let body = serde_json::to_vec(event)
            .map_err(|e| FulfillmentError::Publish(format!("failed to encode reward event: {e}")))?;

        Ok(Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            idempotency_key: event.idempotency_key(),
            exchange: topology::EXCHANGE,
            routing_key: topology::ROUTING_KEY,
            content_type: topology::CONTENT_TYPE,
            persistent: true,
            body,
        })
    }

    /// Decodes the body back into the event.
    pub fn event(&self) -> serde_json::Result<RewardEvent> {
        serde_json::from_slice(&self.body)
    }
}

/// Number of recent publishes a publisher remembers for
/// [`EventPublisher::is_published`].
pub const DEFAULT_RETAINED: usize = 1024;

/// Keeps the newest `capacity` entries, evicting the oldest first.
#[derive(Debug, Clone)]
pub(crate) struct Recent<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> Recent<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(DEFAULT_RETAINED)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

/// Trait for delivering reward events to the broker.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes the event, returning only after the broker acknowledged it.
    async fn publish(&self, event: &RewardEvent) -> Result<()>;

    /// Returns true if this process has recently published the order's reward.
    ///
    /// Best-effort only: the record is in memory, holds a bounded number of
    /// recent orders and is lost on restart.
    /// Consumers must deduplicate on the message's idempotency key.
    async fn is_published(&self, order_id: OrderId) -> bool;
}

/// In-memory publisher that keeps the most recent acknowledged messages.
#[derive(Debug, Clone)]
pub struct InMemoryEventPublisher {
    messages: Arc<RwLock<Recent<RewardMessage>>>,
    fail: Arc<AtomicBool>,
}

impl Default for InMemoryEventPublisher {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RETAINED)
    }
}

impl InMemoryEventPublisher {
    /// Creates a new empty publisher retaining [`DEFAULT_RETAINED`] messages.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Arc::new(RwLock::new(Recent::new(capacity))),
            fail: Arc::default(),
        }
    }

    /// Makes publishes fail as if the broker rejected them.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns the retained messages in publish order.
    pub async fn messages(&self) -> Vec<RewardMessage> {
        self.messages.read().await.iter().cloned().collect()
    }

    /// Returns the decoded events in publish order.
    pub async fn events(&self) -> Vec<RewardEvent> {
        self.messages
            .read()
            .await
            .iter()
            .filter_map(|m| m.event().ok())
            .collect()
    }

    /// Returns the number of retained messages.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id))]
    async fn publish(&self, event: &RewardEvent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FulfillmentError::Publish("broker rejected message".to_string()));
        }

        let message = RewardMessage::new(event)?;
        tracing::debug!(message_id = %message.message_id, "reward message published");
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn is_published(&self, order_id: OrderId) -> bool {
        let key = order_id.to_string();
        self.messages
            .read()
            .await
            .iter()
            .any(|m| m.idempotency_key == key)
    }
}
