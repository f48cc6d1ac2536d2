//! # Order Lifecycle Service
//!
//! Cancellation, line cancellation and administrative status changes.
//!
//! Each operation loads the order inside a transaction, lets the core state
//! machine decide, applies the resulting settlement (restock, wallet credit)
//! and writes the order back with its version check. A concurrent writer
//! makes the write fail with a conflict; the operation is then retried from
//! the top and sees the other writer's result, so a second cancel of the
//! same line fails `NotEligible` instead of refunding twice.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use bazaar_core::validation::validate_reason;
use bazaar_core::{Order, OrderStatus, Settlement};
use bazaar_db::{with_retry, Database, OrderFilter, OrderRepository, RetryPolicy};

use crate::error::{OrderError, OrderResult};
use crate::settlement;

/// An order after a money-moving transition.
#[derive(Debug, Clone, Serialize)]
pub struct SettledOrder {
    pub order: Order,
    /// Taken off the order amount.
    pub refund_paise: i64,
    /// Credited to the wallet (zero for unpaid orders).
    pub wallet_credit_paise: i64,
}

impl SettledOrder {
    fn new(order: Order, settlement: Option<&Settlement>) -> Self {
        SettledOrder {
            refund_paise: settlement.map_or(0, |s| s.refund.paise()),
            wallet_credit_paise: settlement
                .and_then(Settlement::wallet_credit)
                .map_or(0, |m| m.paise()),
            order,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    retry: RetryPolicy,
}

impl OrderService {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        OrderService { db, retry }
    }

    // =========================================================================
    // Customer reads
    // =========================================================================

    /// The user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> OrderResult<Vec<Order>> {
        Ok(self.db.orders().list_for_user(user_id).await?)
    }

    /// One of the user's orders. Other users' orders read as missing.
    pub async fn get_for_user(&self, user_id: &str, order_id: &str) -> OrderResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| OrderError::not_found("Order", order_id))
    }

    // =========================================================================
    // Admin reads
    // =========================================================================

    pub async fn list(&self, filter: &OrderFilter) -> OrderResult<Vec<Order>> {
        Ok(self.db.orders().list(filter).await?)
    }

    pub async fn get(&self, order_id: &str) -> OrderResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Cancels the whole order and refunds what is left of it.
    pub async fn cancel_order(&self, user_id: &str, order_id: &str, reason: &str) -> OrderResult<SettledOrder> {
        let reason = validate_reason(reason)?;
        let reason = reason.as_str();

        let settled = with_retry("cancel_order", self.retry, move || async move {
            let mut tx = self.db.begin().await?;
            let mut order = Self::owned(&mut tx, user_id, order_id).await?;

            let settlement = order.cancel(reason, Utc::now())?;
            let description = format!("Refund for cancelled order {}", order.id);
            settlement::apply(&mut tx, &order, &settlement, &description).await?;
            OrderRepository::update(&mut tx, &mut order).await?;

            tx.commit().await?;
            Ok::<_, OrderError>(SettledOrder::new(order, Some(&settlement)))
        })
        .await?;

        info!(
            order_id = %order_id,
            refund_paise = settled.refund_paise,
            wallet_credit_paise = settled.wallet_credit_paise,
            "Order cancelled"
        );
        Ok(settled)
    }

    /// Cancels one line with a proportional refund.
    pub async fn cancel_line(
        &self,
        user_id: &str,
        order_id: &str,
        line_id: &str,
        reason: &str,
    ) -> OrderResult<SettledOrder> {
        self.settle_line_cancellation(Some(user_id), order_id, line_id, reason)
            .await
    }

    /// Store-side line cancellation, e.g. for an item that cannot be supplied.
    /// Settles exactly like the customer's own.
    pub async fn cancel_line_for_store(
        &self,
        order_id: &str,
        line_id: &str,
        reason: &str,
    ) -> OrderResult<SettledOrder> {
        self.settle_line_cancellation(None, order_id, line_id, reason).await
    }

    async fn settle_line_cancellation(
        &self,
        owner: Option<&str>,
        order_id: &str,
        line_id: &str,
        reason: &str,
    ) -> OrderResult<SettledOrder> {
        let reason = validate_reason(reason)?;
        let reason = reason.as_str();

        let settled = with_retry("cancel_line", self.retry, move || async move {
            let mut tx = self.db.begin().await?;
            let mut order = Self::load(&mut tx, owner, order_id).await?;

            let settlement = order.cancel_line(line_id, reason, Utc::now())?;
            let description = format!("Refund for cancelled item in order {}", order.id);
            settlement::apply(&mut tx, &order, &settlement, &description).await?;
            OrderRepository::update(&mut tx, &mut order).await?;

            tx.commit().await?;
            Ok::<_, OrderError>(SettledOrder::new(order, Some(&settlement)))
        })
        .await?;

        info!(
            order_id = %order_id,
            line_id = %line_id,
            by_store = owner.is_none(),
            refund_paise = settled.refund_paise,
            order_amount_paise = settled.order.order_amount_paise,
            "Order line cancelled"
        );
        Ok(settled)
    }

    /// Administrative status change. Moving to `Cancelled` settles like a
    /// customer cancellation.
    pub async fn update_status(&self, order_id: &str, next: OrderStatus) -> OrderResult<SettledOrder> {
        let settled = with_retry("update_status", self.retry, move || async move {
            let mut tx = self.db.begin().await?;
            let mut order = OrderRepository::find(&mut tx, order_id)
                .await?
                .ok_or_else(|| OrderError::not_found("Order", order_id))?;

            let settlement = order.advance(next, Utc::now())?;
            if let Some(settlement) = &settlement {
                let description = format!("Refund for cancelled order {}", order.id);
                settlement::apply(&mut tx, &order, settlement, &description).await?;
            }
            OrderRepository::update(&mut tx, &mut order).await?;

            tx.commit().await?;
            Ok::<_, OrderError>(SettledOrder::new(order, settlement.as_ref()))
        })
        .await?;

        info!(order_id = %order_id, status = %next, "Order status changed");
        Ok(settled)
    }

    async fn owned(conn: &mut SqliteConnection, user_id: &str, order_id: &str) -> OrderResult<Order> {
        Self::load(conn, Some(user_id), order_id).await
    }

    /// Loads an order; with an owner, other users' orders read as missing.
    async fn load(conn: &mut SqliteConnection, owner: Option<&str>, order_id: &str) -> OrderResult<Order> {
        OrderRepository::find(conn, order_id)
            .await?
            .filter(|o| owner.map_or(true, |user_id| o.user_id == user_id))
            .ok_or_else(|| OrderError::not_found("Order", order_id))
    }
}
