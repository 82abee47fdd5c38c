//! Order orchestrator driving one purchase to a terminal state.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{OrderId, ProductId, UserId};
use domain::{NewOrder, Order, OrderStatus, Payment, PaymentMethod, RewardEvent};
use serde::Deserialize;
use store::{OrderPage, OrderQuery, OrderStore, Reservation};

use crate::error::{FulfillmentError, Result};
use crate::services::{
    ChargeRequest, EventPublisher, PaymentAuthority, ProductCatalog, UserDirectory,
};
use crate::steps;

/// Tunables for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FulfillmentConfig {
    /// Deadline for each remote step.
    pub step_timeout: Duration,
    /// Method every charge is made with.
    pub payment_method: PaymentMethod,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(5),
            payment_method: PaymentMethod::Cash,
        }
    }
}

/// Inbound request to buy `product_count` units of a product.
///
/// Fields are optional so that a missing one is reported as a validation
/// error rather than a decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Option<u64>,
    pub product_id: Option<u64>,
    pub product_count: Option<u64>,
}

impl CreateOrderRequest {
    pub fn new(user_id: u64, product_id: u64, product_count: u64) -> Self {
        Self {
            user_id: Some(user_id),
            product_id: Some(product_id),
            product_count: Some(product_count),
        }
    }

    fn validate(&self) -> Result<(UserId, ProductId, u64)> {
        fn positive(field: &str, value: Option<u64>) -> Result<u64> {
            match value {
                None => Err(FulfillmentError::Validation(format!("{field} is required"))),
                Some(0) => Err(FulfillmentError::Validation(format!(
                    "{field} must be positive"
                ))),
                Some(v) => Ok(v),
            }
        }

        let product_count = positive("product_count", self.product_count)?;
        if product_count > NewOrder::MAX_PRODUCT_COUNT {
            return Err(FulfillmentError::Validation(format!(
                "product_count must not exceed {}",
                NewOrder::MAX_PRODUCT_COUNT
            )));
        }

        Ok((
            UserId::new(positive("user_id", self.user_id)?),
            ProductId::new(positive("product_id", self.product_id)?),
            product_count,
        ))
    }
}

/// Sequences the user lookup, product lookup, charge, reservation and reward
/// publication for one order.
///
/// Once the Pending order is written, every path out of
/// [`OrderOrchestrator::create_order`] moves it to Success or Failed first,
/// unless the order store itself fails.
pub struct OrderOrchestrator {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    payments: Arc<dyn PaymentAuthority>,
    publisher: Arc<dyn EventPublisher>,
    config: FulfillmentConfig,
}

impl OrderOrchestrator {
    /// Creates an orchestrator with the default configuration.
    pub fn new(
        orders: Arc<dyn OrderStore>,
        users: Arc<dyn UserDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        payments: Arc<dyn PaymentAuthority>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            orders,
            users,
            catalog,
            payments,
            publisher,
            config: FulfillmentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FulfillmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads an order by id.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.get(order_id).await?)
    }

    /// Lists orders oldest first.
    pub async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage> {
        Ok(self.orders.list(query).await?)
    }

    /// Creates and fulfils an order.
    ///
    /// Returns the order in its terminal state. A declined charge, missing
    /// stock or a lost reservation race all return `Ok` with a Failed order.
    /// Errors are returned for invalid requests, unknown users or products,
    /// unreachable dependencies, store failures and rejected reward messages.
    #[tracing::instrument(skip(self), fields(order_id = tracing::field::Empty))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let (user_id, product_id, product_count) = request.validate()?;
        let started = Instant::now();

        let user = self.step(steps::LOOKUP_USER, self.users.get(user_id)).await?;
        let product = self
            .step(steps::LOOKUP_PRODUCT, self.catalog.get(product_id))
            .await?;

        let new_order = NewOrder::priced(
            user.id,
            user.username,
            product.id,
            product_count,
            product.unit_price,
        )
        .map_err(|e| FulfillmentError::Validation(e.to_string()))?;

        let order = self.orders.create(new_order).await?;
        tracing::Span::current().record("order_id", tracing::field::display(order.id));
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(amount = %order.amount, "order created");

        let result = self.fulfil(&order).await;

        metrics::histogram!("order_fulfillment_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn fulfil(&self, order: &Order) -> Result<Order> {
        let charge = ChargeRequest {
            order_id: order.id,
            user_id: order.user_id,
            amount: order.amount,
            method: self.config.payment_method,
        };

        let payment = match self
            .step(steps::CHARGE_PAYMENT, self.payments.charge(charge))
            .await
        {
            Ok(payment) => payment,
            Err(err) => {
                let reason = format!("payment outcome unknown: {err}");
                return self
                    .abandon(order.id, "payment_unavailable", reason, err)
                    .await;
            }
        };

        tracing::info!(
            payment_id = %payment.id,
            status = %payment.status,
            method = %payment.method,
            "charge settled"
        );
        if let Err(err) = self.orders.record_payment(order.id, &payment.id).await {
            tracing::warn!(payment_id = %payment.id, error = %err, "failed to record payment id");
        }

        if !payment.is_successful() {
            return self
                .fail(
                    order.id,
                    format!("payment {} declined", payment.id),
                    "payment_declined",
                )
                .await;
        }

        let reservation = match self
            .step(
                steps::RESERVE_STOCK,
                self.catalog.reserve_stock(order.product_id, order.product_count),
            )
            .await
        {
            Ok(reservation) => reservation,
            Err(err) => {
                let mut reason = format!("stock reservation outcome unknown: {err}");
                if let Some(note) = self.refund(&payment).await {
                    reason = format!("{reason}; {note}");
                }
                return self
                    .abandon(order.id, "reservation_unavailable", reason, err)
                    .await;
            }
        };

        let (reason, label) = match reservation {
            Reservation::Reserved { remaining } => {
                tracing::info!(remaining, "stock reserved");
                let order = self.succeed(order.id).await?;
                self.publish_reward(&order).await?;
                return Ok(order);
            }
            Reservation::InsufficientStock { available } => (
                format!(
                    "insufficient stock: requested {}, available {available}",
                    order.product_count
                ),
                "insufficient_stock",
            ),
            Reservation::Conflict => (
                "stock reservation lost to concurrent orders".to_string(),
                "reservation_conflict",
            ),
        };

        let reason = match self.refund(&payment).await {
            Some(note) => format!("{reason}; {note}"),
            None => reason,
        };
        self.fail(order.id, reason, label).await
    }

    /// Runs a remote call under the step deadline.
    async fn step<T>(
        &self,
        step: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.step_timeout, call).await {
            Ok(result) => {
                if let Err(err) = &result {
                    tracing::warn!(step, error = %err, "step failed");
                }
                result
            }
            Err(_) => {
                let timeout_ms = self.config.step_timeout.as_millis() as u64;
                tracing::warn!(step, timeout_ms, "step timed out");
                Err(FulfillmentError::UpstreamUnavailable(format!(
                    "{step} timed out after {:?}",
                    self.config.step_timeout
                )))
            }
        }
    }

    /// Refunds a charge. Returns a note for the failure reason if the refund failed.
    #[tracing::instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn refund(&self, payment: &Payment) -> Option<String> {
        match self
            .step(steps::REFUND_PAYMENT, self.payments.refund(&payment.id))
            .await
        {
            Ok(()) => {
                metrics::counter!("payment_refunds_total", "outcome" => "refunded").increment(1);
                tracing::info!("payment refunded");
                None
            }
            Err(err) => {
                metrics::counter!("payment_refunds_total", "outcome" => "failed").increment(1);
                tracing::error!(error = %err, "payment refund failed");
                Some(format!("refund of {} failed: {err}", payment.id))
            }
        }
    }

    async fn succeed(&self, order_id: OrderId) -> Result<Order> {
        let order = self
            .orders
            .update_status(order_id, OrderStatus::Success, None)
            .await?;
        metrics::counter!("orders_succeeded_total").increment(1);
        tracing::info!(%order_id, "order succeeded");
        Ok(order)
    }

    async fn fail(
        &self,
        order_id: OrderId,
        reason: String,
        label: &'static str,
    ) -> Result<Order> {
        tracing::info!(%order_id, %reason, "order failed");
        let order = self
            .orders
            .update_status(order_id, OrderStatus::Failed, Some(reason))
            .await?;
        metrics::counter!("orders_failed_total", "reason" => label).increment(1);
        Ok(order)
    }

    /// Fails an order whose remote step ended without a known outcome, then
    /// reports the step error. A store failure here takes precedence.
    async fn abandon(
        &self,
        order_id: OrderId,
        label: &'static str,
        reason: String,
        err: FulfillmentError,
    ) -> Result<Order> {
        self.fail(order_id, reason, label).await?;
        Err(err)
    }

    async fn publish_reward(&self, order: &Order) -> Result<()> {
        let event = RewardEvent::for_order(order);

        match self
            .step(steps::PUBLISH_REWARD, self.publisher.publish(&event))
            .await
        {
            Ok(()) => {
                metrics::counter!("reward_events_published_total").increment(1);
                Ok(())
            }
            Err(err) => {
                metrics::counter!("reward_publish_failures_total").increment(1);
                tracing::error!(order_id = %order.id, error = %err, "reward publish failed");
                Err(match err {
                    FulfillmentError::UpstreamUnavailable(reason) => {
                        FulfillmentError::Publish(reason)
                    }
                    other => other,
                })
            }
        }
    }
}
