//! Payment authority trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Money, Payment, PaymentMethod, PaymentStatus};
use tokio::sync::RwLock;

use crate::error::{FulfillmentError, Result};

/// A charge to be made for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub method: PaymentMethod,
}

/// Trait for charging and refunding payments.
#[async_trait]
pub trait PaymentAuthority: Send + Sync {
    /// Requests a charge.
    ///
    /// A declined charge is a `Payment` with status Failed. An `Err` means the
    /// outcome is unknown.
    async fn charge(&self, request: ChargeRequest) -> Result<Payment>;

    /// Refunds a previously successful charge.
    async fn refund(&self, payment_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct PaymentBook {
    payments: HashMap<String, Payment>,
    refunded: Vec<String>,
    next_id: u32,
}

/// In-memory payment authority for testing and single-process runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentAuthority {
    book: Arc<RwLock<PaymentBook>>,
    decline: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
    fail_refunds: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
    charges: Arc<AtomicUsize>,
}

impl InMemoryPaymentAuthority {
    /// Creates a new payment authority that accepts every charge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent charges come back declined.
    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    /// Makes charges and refunds fail as if the service were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes refunds fail while charges keep working.
    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Delays every charge by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Returns how many charge calls have been made.
    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Returns the number of recorded payments, declined ones included.
    pub async fn payment_count(&self) -> usize {
        self.book.read().await.payments.len()
    }

    /// Returns a recorded payment.
    pub async fn payment(&self, payment_id: &str) -> Option<Payment> {
        self.book.read().await.payments.get(payment_id).cloned()
    }

    /// Returns the ids of refunded payments in refund order.
    pub async fn refunded(&self) -> Vec<String> {
        self.book.read().await.refunded.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FulfillmentError::UpstreamUnavailable(
                "payment authority unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentAuthority for InMemoryPaymentAuthority {
    async fn charge(&self, request: ChargeRequest) -> Result<Payment> {
        self.charges.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check_available()?;

        let status = if self.decline.load(Ordering::SeqCst) {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Success
        };

        let mut book = self.book.write().await;
        book.next_id += 1;
        let payment = Payment {
            id: format!("PAY-{:04}", book.next_id),
            order_id: request.order_id,
            user_id: request.user_id,
            amount: request.amount,
            method: request.method,
            status,
        };
        book.payments.insert(payment.id.clone(), payment.clone());

        Ok(payment)
    }

    async fn refund(&self, payment_id: &str) -> Result<()> {
        self.check_available()?;
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(FulfillmentError::UpstreamUnavailable(format!(
                "refund of {payment_id} rejected"
            )));
        }

        let mut book = self.book.write().await;
        match book.payments.get(payment_id) {
            Some(payment) if payment.is_successful() => {
                if !book.refunded.iter().any(|id| id == payment_id) {
                    book.refunded.push(payment_id.to_string());
                }
                Ok(())
            }
            Some(_) => Err(FulfillmentError::Validation(format!(
                "payment {payment_id} was not charged"
            ))),
            None => Err(FulfillmentError::NotFound(format!("payment {payment_id}"))),
        }
    }
}
