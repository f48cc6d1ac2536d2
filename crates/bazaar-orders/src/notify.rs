//! # Order Notifications
//!
//! Confirmation messages sent once an order is committed. Delivery is best
//! effort: a failed send is logged and never undoes the order.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use bazaar_core::{Order, OrderStatus, PaymentMethod};

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// What the customer is told about a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub item_count: i64,
    pub total_paise: i64,
}

impl OrderSummary {
    pub fn of(order: &Order) -> Self {
        OrderSummary {
            order_id: order.id.clone(),
            status: order.status,
            payment_method: order.payment_method,
            item_count: order.lines.iter().map(|l| l.quantity).sum(),
            total_paise: order.order_amount_paise,
        }
    }
}

/// Sends order confirmations (implemented by the mail integration).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_order_confirmation(&self, email: &str, summary: &OrderSummary) -> Result<(), NotifyError>;
}

/// Writes confirmations to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_order_confirmation(&self, email: &str, summary: &OrderSummary) -> Result<(), NotifyError> {
        info!(
            email = %email,
            order_id = %summary.order_id,
            total_paise = summary.total_paise,
            "Order confirmation"
        );
        Ok(())
    }
}

/// Keeps every confirmation in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, OrderSummary)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(String, OrderSummary)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_order_confirmation(&self, email: &str, summary: &OrderSummary) -> Result<(), NotifyError> {
        self.sent.lock().await.push((email.to_string(), summary.clone()));
        Ok(())
    }
}

/// Sends a confirmation after commit, logging instead of failing.
pub(crate) async fn confirm(notifier: &dyn Notifier, email: &str, order: &Order) {
    let summary = OrderSummary::of(order);
    if let Err(e) = notifier.send_order_confirmation(email, &summary).await {
        warn!(order_id = %order.id, error = %e, "Order confirmation not sent");
    }
}
