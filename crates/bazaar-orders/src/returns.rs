//! # Return Workflow
//!
//! ```text
//!  Delivered ──request──► ReturnRequest(Pending), lines ReturnRequested
//!                              │
//!               ┌──────────────┴──────────────┐
//!            approve                        reject
//!               │                             │
//!   lines Returned, batch refund      lines back to Ordered
//!   restock, wallet credit
//! ```
//!
//! A request is resolved at most once. The stored status is checked again
//! by the resolving UPDATE, so two admins racing on the same request end
//! with one resolution and one `NotEligible`.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use bazaar_core::validation::validate_reason;
use bazaar_core::{Order, ReturnRequest, ReturnScope, ReturnStatus};
use bazaar_db::{with_retry, Database, OrderRepository, ReturnRepository, RetryPolicy};

use crate::error::{OrderError, OrderResult};
use crate::settlement;

/// A resolved return and the order it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnResolution {
    pub request: ReturnRequest,
    pub order: Order,
    pub wallet_credit_paise: i64,
}

#[derive(Debug, Clone)]
pub struct ReturnService {
    db: Database,
    retry: RetryPolicy,
}

impl ReturnService {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        ReturnService { db, retry }
    }

    /// Opens a return for one line or every remaining line of a delivered order.
    pub async fn request_return(
        &self,
        user_id: &str,
        order_id: &str,
        scope: &ReturnScope,
        reason: &str,
    ) -> OrderResult<ReturnRequest> {
        let reason = validate_reason(reason)?;
        let reason = reason.as_str();

        let request = with_retry("request_return", self.retry, move || async move {
            let mut tx = self.db.begin().await?;
            let mut order = OrderRepository::find(&mut tx, order_id)
                .await?
                .filter(|o| o.user_id == user_id)
                .ok_or_else(|| OrderError::not_found("Order", order_id))?;

            let line_ids = order.request_return(scope, reason, Utc::now())?;
            let request = ReturnRequest::open(&order, &line_ids, reason);
            ReturnRepository::insert(&mut tx, &request).await?;
            OrderRepository::update(&mut tx, &mut order).await?;

            tx.commit().await?;
            Ok::<_, OrderError>(request)
        })
        .await?;

        info!(
            return_id = %request.id,
            order_id = %order_id,
            lines = request.items.len(),
            "Return requested"
        );
        Ok(request)
    }

    /// Accepts the return: refunds the batch to the wallet and restocks.
    pub async fn approve(&self, return_id: &str) -> OrderResult<ReturnResolution> {
        let resolution = with_retry("approve_return", self.retry, move || async move {
            let mut tx = self.db.begin().await?;
            let (mut request, mut order) = Self::load(&mut tx, return_id).await?;
            let now = Utc::now();

            let settlement = order.approve_return(&request.line_ids(), now)?;
            request.approve(settlement.refund, now)?;

            let description = format!("Refund for returned items in order {}", order.id);
            settlement::apply(&mut tx, &order, &settlement, &description).await?;
            ReturnRepository::resolve(&mut tx, &request).await?;
            OrderRepository::update(&mut tx, &mut order).await?;

            tx.commit().await?;
            Ok::<_, OrderError>(ReturnResolution {
                request,
                order,
                wallet_credit_paise: settlement.wallet_credit().map_or(0, |m| m.paise()),
            })
        })
        .await?;

        info!(
            return_id = %return_id,
            order_id = %resolution.order.id,
            refund_paise = resolution.request.refund_paise.unwrap_or(0),
            order_status = %resolution.order.status,
            "Return approved"
        );
        Ok(resolution)
    }

    /// Declines the return: lines go back to the customer's order.
    pub async fn reject(&self, return_id: &str) -> OrderResult<ReturnResolution> {
        let resolution = with_retry("reject_return", self.retry, move || async move {
            let mut tx = self.db.begin().await?;
            let (mut request, mut order) = Self::load(&mut tx, return_id).await?;
            let now = Utc::now();

            request.reject(now)?;
            order.reject_return(&request.line_ids(), now)?;

            ReturnRepository::resolve(&mut tx, &request).await?;
            OrderRepository::update(&mut tx, &mut order).await?;

            tx.commit().await?;
            Ok::<_, OrderError>(ReturnResolution {
                request,
                order,
                wallet_credit_paise: 0,
            })
        })
        .await?;

        info!(return_id = %return_id, order_id = %resolution.order.id, "Return rejected");
        Ok(resolution)
    }

    /// Admin queue, oldest first.
    pub async fn list(&self, status: Option<ReturnStatus>) -> OrderResult<Vec<ReturnRequest>> {
        Ok(self.db.returns().list(status).await?)
    }

    pub async fn list_for_user(&self, user_id: &str) -> OrderResult<Vec<ReturnRequest>> {
        Ok(self.db.returns().list_for_user(user_id).await?)
    }

    async fn load(conn: &mut SqliteConnection, return_id: &str) -> OrderResult<(ReturnRequest, Order)> {
        let request = ReturnRepository::find(conn, return_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Return request", return_id))?;
        let order = OrderRepository::find(conn, &request.order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", &request.order_id))?;
        Ok((request, order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{file_harness, fund_wallet, harness, place_order, seed_product, Harness};
    use bazaar_core::{LineStatus, Money, OrderStatus, PaymentMethod};

    /// ₹300 + ₹100, ₹50 shipping, wallet-paid and delivered.
    async fn delivered_order(h: &Harness) -> Order {
        seed_product(&h.db, "p1", 30_000, 5).await;
        seed_product(&h.db, "p2", 10_000, 5).await;
        fund_wallet(&h.db, "u1", Money::from_rupees(450)).await;
        h.services.cart.add_item("u1", "p1", 1).await.unwrap();
        h.services.cart.add_item("u1", "p2", 1).await.unwrap();
        let order = place_order(h, "u1", PaymentMethod::Wallet, None).await;
        h.services
            .orders
            .update_status(&order.id, OrderStatus::Delivered)
            .await
            .unwrap()
            .order
    }

    fn line_of(order: &Order, product_id: &str) -> String {
        order
            .lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.id.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_line_return_approved_once() {
        let h = harness().await;
        let order = delivered_order(&h).await;
        assert_eq!(h.services.wallet.balance("u1").await.unwrap(), Money::zero());

        let scope = ReturnScope::Line(line_of(&order, "p1"));
        let request = h
            .services
            .returns
            .request_return("u1", &order.id, &scope, "damaged in transit")
            .await
            .unwrap();
        assert_eq!(request.status, ReturnStatus::Pending);

        let resolution = h.services.returns.approve(&request.id).await.unwrap();
        // 300 + 300/400 of 50 shipping
        assert_eq!(resolution.request.refund_paise, Some(33_750));
        assert_eq!(resolution.wallet_credit_paise, 33_750);
        assert_eq!(resolution.order.status, OrderStatus::Delivered);
        assert_eq!(resolution.order.order_amount_paise, 45_000 - 33_750);
        assert_eq!(h.db.products().get_by_id("p1").await.unwrap().unwrap().stock, 5);

        let err = h.services.returns.approve(&request.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotEligible);
        let err = h.services.returns.reject(&request.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotEligible);
        assert_eq!(h.services.wallet.balance("u1").await.unwrap(), Money::from_paise(33_750));
    }

    #[tokio::test]
    async fn test_whole_order_return_settles_everything() {
        let h = harness().await;
        let order = delivered_order(&h).await;

        let request = h
            .services
            .returns
            .request_return("u1", &order.id, &ReturnScope::WholeOrder, "wrong size")
            .await
            .unwrap();
        assert_eq!(request.items.len(), 2);
        let pending = h.services.orders.get_for_user("u1", &order.id).await.unwrap();
        assert_eq!(pending.status, OrderStatus::ReturnRequested);

        let resolution = h.services.returns.approve(&request.id).await.unwrap();
        assert_eq!(resolution.order.status, OrderStatus::Returned);
        assert_eq!(resolution.order.order_amount_paise, 0);
        assert!(resolution.order.lines.iter().all(|l| l.status == LineStatus::Returned));
        assert_eq!(h.services.wallet.balance("u1").await.unwrap(), Money::from_rupees(450));
    }

    #[tokio::test]
    async fn test_reject_restores_lines() {
        let h = harness().await;
        let order = delivered_order(&h).await;

        let request = h
            .services
            .returns
            .request_return("u1", &order.id, &ReturnScope::WholeOrder, "changed mind")
            .await
            .unwrap();
        let resolution = h.services.returns.reject(&request.id).await.unwrap();

        assert_eq!(resolution.request.status, ReturnStatus::Rejected);
        assert_eq!(resolution.order.status, OrderStatus::Delivered);
        assert!(resolution.order.lines.iter().all(|l| l.status == LineStatus::Ordered));
        assert_eq!(h.services.wallet.balance("u1").await.unwrap(), Money::zero());
        assert!(h.services.returns.list(Some(ReturnStatus::Pending)).await.unwrap().is_empty());
        assert_eq!(h.services.returns.list_for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_return_requires_delivery() {
        let h = harness().await;
        seed_product(&h.db, "p1", 30_000, 5).await;
        h.services.cart.add_item("u1", "p1", 1).await.unwrap();
        let order = place_order(&h, "u1", PaymentMethod::Cod, None).await;

        let err = h
            .services
            .returns
            .request_return("u1", &order.id, &ReturnScope::WholeOrder, "too slow")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotEligible);

        let err = h
            .services
            .returns
            .request_return("u1", &order.id, &ReturnScope::WholeOrder, "   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_approvals_refund_once() {
        let h = file_harness().await;
        let order = delivered_order(&h).await;
        let request = h
            .services
            .returns
            .request_return("u1", &order.id, &ReturnScope::WholeOrder, "wrong size")
            .await
            .unwrap();
        let returns = &h.services.returns;

        let (first, second) = tokio::join!(returns.approve(&request.id), returns.approve(&request.id));
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.kind(), ErrorKind::NotEligible);

        assert_eq!(h.services.wallet.balance("u1").await.unwrap(), Money::from_rupees(450));
        for id in ["p1", "p2"] {
            assert_eq!(h.db.products().get_by_id(id).await.unwrap().unwrap().stock, 5);
        }
        let stored = h.services.orders.get(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Returned);
        assert_eq!(stored.order_amount_paise, 0);
    }
}
