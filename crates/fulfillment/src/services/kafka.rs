//! Kafka-backed reward publisher.
//!
//! Maps the exchange/queue topology onto one topic named after the queue.
//! The record key is the idempotency key, so every redelivery of an order's
//! reward lands on the same partition. The exchange topology, message id and
//! content type travel as headers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::RewardEvent;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use tokio::sync::RwLock;

use super::publisher::{DEFAULT_RETAINED, EventPublisher, Recent, RewardMessage, topology};
use crate::error::{FulfillmentError, Result};

/// Publisher that waits for the full in-sync replica set to acknowledge.
#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    delivery_timeout: Duration,
    published: Arc<RwLock<Recent<OrderId>>>,
}

impl KafkaEventPublisher {
    /// Creates an idempotent producer for `brokers`.
    pub fn new(brokers: &str, delivery_timeout: Duration) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("message.timeout.ms", delivery_timeout.as_millis().to_string())
            .create()
            .map_err(|e| FulfillmentError::Publish(format!("failed to create producer: {e}")))?;

        tracing::info!(brokers, topic = topology::QUEUE, "Kafka reward publisher ready");
        Ok(Self {
            producer,
            delivery_timeout,
            published: Arc::new(RwLock::new(Recent::new(DEFAULT_RETAINED))),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    #[tracing::instrument(
        skip(self, event),
        fields(order_id = %event.order_id, topic = topology::QUEUE)
    )]
    async fn publish(&self, event: &RewardEvent) -> Result<()> {
        let message = RewardMessage::new(event)?;
        let message_id = message.message_id.to_string();

        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "message_id",
                value: Some(message_id.as_str()),
            })
            .insert(Header {
                key: "exchange",
                value: Some(message.exchange),
            })
            .insert(Header {
                key: "exchange_kind",
                value: Some(topology::EXCHANGE_KIND),
            })
            .insert(Header {
                key: "routing_key",
                value: Some(message.routing_key),
            })
            .insert(Header {
                key: "content_type",
                value: Some(message.content_type),
            });

        let record = FutureRecord::to(topology::QUEUE)
            .key(&message.idempotency_key)
            .payload(&message.body)
            .headers(headers)
            .timestamp(message.timestamp.timestamp_millis());

        let delivery = self
            .producer
            .send(record, self.delivery_timeout)
            .await
            .map_err(|(e, _)| FulfillmentError::Publish(format!("delivery failed: {e}")))?;

        tracing::debug!(
            %message_id,
            partition = delivery.partition,
            offset = delivery.offset,
            "reward message acknowledged"
        );
        self.published.write().await.push(event.order_id);
        Ok(())
    }

    async fn is_published(&self, order_id: OrderId) -> bool {
        self.published.read().await.iter().any(|id| *id == order_id)
    }
}
