//! # Order State Machine
//!
//! An order and its lines, and every status transition they can make.
//!
//! ## Order Status
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pending ──► Processing ──► Shipped ──► OutForDelivery ──► Delivered    │
//! │     │            │             │              │                 │       │
//! │     └────────────┴──────┬──────┴──────────────┘                 │       │
//! │                         ▼                                       ▼       │
//! │                     Cancelled                        ReturnRequested    │
//! │                                                        │          │     │
//! │                                                  (rejected)  (approved) │
//! │                                                        ▼          ▼     │
//! │                                                   Delivered   Returned  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Status
//! ```text
//! Ordered ──► Cancelled
//!    │
//!    └──► ReturnRequested ──► Returned
//!                  │
//!                  └──► Ordered   (return rejected)
//! ```
//!
//! ## Money Rule
//! `order_amount + refunded == subtotal + shipping − coupon_discount`
//! holds after every transition. Each operation returns a [`Settlement`]
//! describing the money and stock the caller must move in the same
//! database transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::checkout::CheckoutQuote;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::refund::RefundBasis;
use crate::types::{AddressSnapshot, CartItem, PaymentMethod, PaymentStatus};

// =============================================================================
// Status Enums
// =============================================================================

/// Overall status of an order.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    ReturnRequested,
    Returned,
}

impl OrderStatus {
    /// Position along the forward fulfilment sequence.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::OutForDelivery => Some(3),
            OrderStatus::Delivered => Some(4),
            _ => None,
        }
    }

    /// Whole-order cancellation is allowed before delivery.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::OutForDelivery
        )
    }

    /// Single lines can be cancelled only before shipping.
    pub fn allows_line_cancellation(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Whether an administrator may move an order from `self` to `next`.
    ///
    /// Forward moves along the fulfilment sequence, or `Cancelled` from any
    /// cancellable state.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        if next == OrderStatus::Cancelled {
            return self.is_cancellable();
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::ReturnRequested => "Return Requested",
            OrderStatus::Returned => "Returned",
        };
        f.write_str(label)
    }
}

/// Status of one order line.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Ordered,
    Cancelled,
    ReturnRequested,
    Returned,
}

impl LineStatus {
    /// Still owned by the customer and not yet refunded.
    pub fn is_active(self) -> bool {
        matches!(self, LineStatus::Ordered | LineStatus::ReturnRequested)
    }
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LineStatus::Ordered => "Ordered",
            LineStatus::Cancelled => "Cancelled",
            LineStatus::ReturnRequested => "Return Requested",
            LineStatus::Returned => "Returned",
        };
        f.write_str(label)
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// One product entry in an order. Addressed by its own `id`, never by position.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    /// Display order within the order.
    pub position: i64,
    pub product_id: String,
    /// Product name at time of purchase (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Base price at purchase.
    pub unit_price_paise: i64,
    /// Post-offer price at purchase.
    pub final_price_paise: i64,
    /// `final_price × quantity`.
    pub total_paise: i64,
    pub status: LineStatus,
    pub cancellation_reason: Option<String>,
}

impl OrderLine {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }

    /// Offer savings on this line.
    pub fn savings(&self) -> Money {
        Money::from_paise((self.unit_price_paise - self.final_price_paise) * self.quantity)
    }
}

// =============================================================================
// Order
// =============================================================================

/// One checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub address: AddressSnapshot,
    /// ΣT: sum of line totals at placement. Never changes.
    pub subtotal_paise: i64,
    pub shipping_paise: i64,
    pub coupon_code: Option<String>,
    pub coupon_discount_paise: i64,
    /// Offer savings across all lines at placement.
    pub offer_savings_paise: i64,
    /// Amount still owed/held for the order; reduced by every refund.
    pub order_amount_paise: i64,
    /// Total refunded so far.
    pub refunded_paise: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub cancellation_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub return_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub return_requested_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped on every write.
    pub version: i64,
}

/// Units to put back on the shelf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restock {
    pub product_id: String,
    pub quantity: i64,
}

/// What a transition requires the caller to apply alongside the order write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Amount taken off `order_amount`.
    pub refund: Money,
    /// Whether the refund goes back to the wallet (only money actually paid).
    pub credit_wallet: bool,
    pub restock: Vec<Restock>,
    /// Lines this settlement touched.
    pub line_ids: Vec<String>,
}

impl Settlement {
    /// The wallet credit to issue, if any.
    pub fn wallet_credit(&self) -> Option<Money> {
        (self.credit_wallet && self.refund.is_positive()).then_some(self.refund)
    }
}

/// What a verified online payment leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentCapture {
    /// The order moves on to fulfilment; its stock must be committed.
    Fulfil,
    /// The order was cancelled before the payment landed. The captured
    /// amount goes to the wallet.
    Refund(Money),
}

/// Which lines a return request covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "scope", content = "line_id", rename_all = "snake_case")]
pub enum ReturnScope {
    WholeOrder,
    Line(String),
}

impl Order {
    /// Builds a new order from cart items and a checkout quote.
    ///
    /// Initial status depends on the payment method:
    /// - COD: Processing, payment pending
    /// - Wallet: Processing, paid
    /// - Gateway: Pending, payment pending until verified
    pub fn place(
        user_id: &str,
        items: &[CartItem],
        address: AddressSnapshot,
        quote: &CheckoutQuote,
        payment_method: PaymentMethod,
    ) -> CoreResult<Self> {
        if items.is_empty() {
            return Err(ValidationError::Required {
                field: "cart items".to_string(),
            }
            .into());
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let lines: Vec<OrderLine> = items
            .iter()
            .enumerate()
            .map(|(position, item)| OrderLine {
                id: Uuid::new_v4().to_string(),
                order_id: id.clone(),
                position: position as i64,
                product_id: item.product_id.clone(),
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price_paise: item.unit_price_paise,
                final_price_paise: item.final_price_paise,
                total_paise: item.line_total().paise(),
                status: LineStatus::Ordered,
                cancellation_reason: None,
            })
            .collect();
        let offer_savings: Money = lines.iter().map(OrderLine::savings).sum();

        let (status, payment_status) = match payment_method {
            PaymentMethod::Cod => (OrderStatus::Processing, PaymentStatus::Pending),
            PaymentMethod::Wallet => (OrderStatus::Processing, PaymentStatus::Paid),
            PaymentMethod::Gateway => (OrderStatus::Pending, PaymentStatus::Pending),
        };

        Ok(Order {
            id,
            user_id: user_id.to_string(),
            lines,
            status,
            address,
            subtotal_paise: quote.subtotal_paise,
            shipping_paise: quote.shipping_paise,
            coupon_code: quote.coupon_code.clone(),
            coupon_discount_paise: quote.coupon_discount_paise,
            offer_savings_paise: offer_savings.paise(),
            order_amount_paise: quote.total_paise,
            refunded_paise: 0,
            payment_method,
            payment_status,
            gateway_order_id: None,
            gateway_payment_id: None,
            gateway_signature: None,
            cancellation_reason: None,
            cancelled_at: None,
            return_reason: None,
            return_requested_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn order_amount(&self) -> Money {
        Money::from_paise(self.order_amount_paise)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_paise(self.subtotal_paise)
    }

    pub fn refund_basis(&self) -> RefundBasis {
        RefundBasis {
            items_total: self.subtotal(),
            shipping: Money::from_paise(self.shipping_paise),
            coupon_discount: Money::from_paise(self.coupon_discount_paise),
        }
    }

    /// Amount the customer was charged at placement.
    pub fn charged(&self) -> Money {
        self.subtotal() + Money::from_paise(self.shipping_paise) - Money::from_paise(self.coupon_discount_paise)
    }

    pub fn line(&self, line_id: &str) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    fn line_mut(&mut self, line_id: &str) -> CoreResult<&mut OrderLine> {
        let order_id = self.id.clone();
        self.lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| CoreError::LineNotFound {
                order_id,
                line_id: line_id.to_string(),
            })
    }

    fn active_line_count(&self) -> usize {
        self.lines.iter().filter(|l| l.status.is_active()).count()
    }

    fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Whether placement took the units out of stock. Online orders only do
    /// so once their payment is verified.
    pub fn stock_committed(&self) -> bool {
        self.payment_method != PaymentMethod::Gateway || self.is_paid()
    }

    fn not_eligible(&self, reason: impl Into<String>) -> CoreError {
        CoreError::not_eligible("Order", self.id.clone(), reason)
    }

    /// Takes `refund` off the order amount, never going below zero.
    fn take_refund(&mut self, refund: Money) -> Money {
        let refund = refund.clamp_non_negative().min(self.order_amount());
        self.order_amount_paise -= refund.paise();
        self.refunded_paise += refund.paise();
        refund
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    // -------------------------------------------------------------------------
    // Payment transitions
    // -------------------------------------------------------------------------

    /// Records a verified gateway payment.
    ///
    /// A pending order becomes paid and Processing. An order cancelled while
    /// unpaid still records the payment, and everything the customer paid
    /// beyond the remaining order amount comes back as a refund.
    pub fn confirm_payment(
        &mut self,
        payment_id: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<PaymentCapture> {
        if self.payment_method != PaymentMethod::Gateway {
            return Err(self.not_eligible("order is not paid online"));
        }
        if self.is_paid() {
            return Err(self.not_eligible("payment already verified"));
        }
        let capture = match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Processing;
                PaymentCapture::Fulfil
            }
            OrderStatus::Cancelled => PaymentCapture::Refund(self.charged() - self.order_amount()),
            other => return Err(self.not_eligible(format!("order is {other}"))),
        };
        self.payment_status = PaymentStatus::Paid;
        self.gateway_payment_id = Some(payment_id.to_string());
        self.gateway_signature = Some(signature.to_string());
        self.touch(now);
        Ok(capture)
    }

    /// Gateway payment abandoned or declined.
    pub fn fail_payment(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.payment_method != PaymentMethod::Gateway || self.payment_status != PaymentStatus::Pending {
            return Err(self.not_eligible("no pending online payment"));
        }
        self.payment_status = PaymentStatus::Failed;
        self.touch(now);
        Ok(())
    }

    /// Re-opens a failed gateway payment against a new remote order.
    pub fn retry_payment(&mut self, gateway_order_id: &str, now: DateTime<Utc>) -> CoreResult<()> {
        if self.payment_method != PaymentMethod::Gateway || self.payment_status != PaymentStatus::Failed {
            return Err(self.not_eligible("only failed online payments can be retried"));
        }
        if self.status != OrderStatus::Pending {
            return Err(self.not_eligible(format!("order is {}", self.status)));
        }
        self.payment_status = PaymentStatus::Pending;
        self.gateway_order_id = Some(gateway_order_id.to_string());
        self.touch(now);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Fulfilment transitions
    // -------------------------------------------------------------------------

    /// Administrative status change.
    ///
    /// Moving to `Cancelled` cancels the whole order and returns its settlement.
    /// Delivering a COD order marks it paid.
    pub fn advance(&mut self, next: OrderStatus, now: DateTime<Utc>) -> CoreResult<Option<Settlement>> {
        if !self.status.can_advance_to(next) {
            return Err(self.not_eligible(format!("cannot move from {} to {}", self.status, next)));
        }
        if next == OrderStatus::Cancelled {
            return self.cancel("Cancelled by store", now).map(Some);
        }
        if self.payment_method == PaymentMethod::Gateway && !self.is_paid() {
            return Err(self.not_eligible("online payment is not complete"));
        }

        self.status = next;
        if next == OrderStatus::Delivered {
            self.delivered_at = Some(now);
            if self.payment_method == PaymentMethod::Cod {
                self.payment_status = PaymentStatus::Paid;
            }
        }
        self.touch(now);
        Ok(None)
    }

    /// Cancels the whole order. Refunds everything still held.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> CoreResult<Settlement> {
        if !self.status.is_cancellable() {
            return Err(self.not_eligible(format!("order is {}", self.status)));
        }

        let committed = self.stock_committed();
        let mut restock = Vec::new();
        let mut line_ids = Vec::new();
        for line in self.lines.iter_mut().filter(|l| l.status == LineStatus::Ordered) {
            line.status = LineStatus::Cancelled;
            line.cancellation_reason = Some(reason.to_string());
            if committed {
                restock.push(Restock {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                });
            }
            line_ids.push(line.id.clone());
        }

        let refund = self.take_refund(self.order_amount());
        self.status = OrderStatus::Cancelled;
        self.cancellation_reason = Some(reason.to_string());
        self.cancelled_at = Some(now);
        self.touch(now);

        Ok(Settlement {
            refund,
            credit_wallet: self.is_paid(),
            restock,
            line_ids,
        })
    }

    /// Cancels one line before shipping with a proportional refund.
    ///
    /// Cancelling the last active line cancels the order and refunds the
    /// whole remaining amount.
    pub fn cancel_line(&mut self, line_id: &str, reason: &str, now: DateTime<Utc>) -> CoreResult<Settlement> {
        if !self.status.allows_line_cancellation() {
            return Err(self.not_eligible(format!("order is {}", self.status)));
        }
        // The gateway charges the amount the remote order was opened with
        if self.payment_method == PaymentMethod::Gateway && !self.is_paid() {
            return Err(self.not_eligible(
                "online payment is not complete, cancel the whole order instead",
            ));
        }
        let basis = self.refund_basis();
        let committed = self.stock_committed();
        let order_id = self.id.clone();
        let line = self.line_mut(line_id)?;
        if line.status != LineStatus::Ordered {
            return Err(CoreError::not_eligible(
                "Order line",
                line_id,
                format!("line is {} in order {}", line.status, order_id),
            ));
        }
        line.status = LineStatus::Cancelled;
        line.cancellation_reason = Some(reason.to_string());
        let restock = if committed {
            vec![Restock {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            }]
        } else {
            Vec::new()
        };
        let proportional = basis.cancellation(line.total());

        let refund = if self.active_line_count() == 0 {
            self.status = OrderStatus::Cancelled;
            self.cancellation_reason = Some(reason.to_string());
            self.cancelled_at = Some(now);
            self.take_refund(self.order_amount())
        } else {
            self.take_refund(proportional)
        };
        self.touch(now);

        Ok(Settlement {
            refund,
            credit_wallet: self.is_paid(),
            restock,
            line_ids: vec![line_id.to_string()],
        })
    }

    // -------------------------------------------------------------------------
    // Return transitions
    // -------------------------------------------------------------------------

    /// Opens a return for one line or the whole order. Returns the line ids
    /// moved to `ReturnRequested`. No money moves yet.
    pub fn request_return(&mut self, scope: &ReturnScope, reason: &str, now: DateTime<Utc>) -> CoreResult<Vec<String>> {
        if self.status != OrderStatus::Delivered {
            return Err(self.not_eligible(format!("order is {}", self.status)));
        }

        let line_ids: Vec<String> = match scope {
            ReturnScope::Line(line_id) => {
                let line = self.line(line_id).ok_or_else(|| CoreError::LineNotFound {
                    order_id: self.id.clone(),
                    line_id: line_id.clone(),
                })?;
                if line.status != LineStatus::Ordered {
                    return Err(CoreError::not_eligible(
                        "Order line",
                        line_id.clone(),
                        format!("line is {}", line.status),
                    ));
                }
                vec![line_id.clone()]
            }
            ReturnScope::WholeOrder => {
                let ids: Vec<String> = self
                    .lines
                    .iter()
                    .filter(|l| l.status == LineStatus::Ordered)
                    .map(|l| l.id.clone())
                    .collect();
                if ids.is_empty() {
                    return Err(self.not_eligible("no lines left to return"));
                }
                ids
            }
        };

        for line in self.lines.iter_mut().filter(|l| line_ids.contains(&l.id)) {
            line.status = LineStatus::ReturnRequested;
        }
        if *scope == ReturnScope::WholeOrder {
            self.status = OrderStatus::ReturnRequested;
        }
        self.return_reason = Some(reason.to_string());
        self.return_requested_at = Some(now);
        self.touch(now);
        Ok(line_ids)
    }

    fn ensure_return_requested(&self, line_ids: &[String]) -> CoreResult<()> {
        if line_ids.is_empty() {
            return Err(self.not_eligible("return covers no lines"));
        }
        for line_id in line_ids {
            let line = self.line(line_id).ok_or_else(|| CoreError::LineNotFound {
                order_id: self.id.clone(),
                line_id: line_id.clone(),
            })?;
            if line.status != LineStatus::ReturnRequested {
                return Err(CoreError::not_eligible(
                    "Order line",
                    line_id.clone(),
                    format!("line is {}", line.status),
                ));
            }
        }
        Ok(())
    }

    /// Completes a return: lines become `Returned` and the batch is refunded.
    pub fn approve_return(&mut self, line_ids: &[String], now: DateTime<Utc>) -> CoreResult<Settlement> {
        self.ensure_return_requested(line_ids)?;

        let basis = self.refund_basis();
        let mut totals = Vec::with_capacity(line_ids.len());
        let mut restock = Vec::with_capacity(line_ids.len());
        for line in self.lines.iter_mut().filter(|l| line_ids.contains(&l.id)) {
            line.status = LineStatus::Returned;
            totals.push(line.total());
            restock.push(Restock {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            });
        }

        let refund = if self.active_line_count() == 0 {
            self.take_refund(self.order_amount())
        } else {
            self.take_refund(basis.batch_return(totals))
        };

        let all_returned = self
            .lines
            .iter()
            .filter(|l| l.status != LineStatus::Cancelled)
            .all(|l| l.status == LineStatus::Returned);
        if all_returned {
            self.status = OrderStatus::Returned;
        } else {
            self.settle_return_status();
        }
        self.touch(now);

        Ok(Settlement {
            refund,
            credit_wallet: self.is_paid(),
            restock,
            line_ids: line_ids.to_vec(),
        })
    }

    /// Declines a return: lines go back to `Ordered`.
    pub fn reject_return(&mut self, line_ids: &[String], now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_return_requested(line_ids)?;
        for line in self.lines.iter_mut().filter(|l| line_ids.contains(&l.id)) {
            line.status = LineStatus::Ordered;
        }
        self.settle_return_status();
        self.touch(now);
        Ok(())
    }

    /// Back to `Delivered` once no return is left open on any line.
    fn settle_return_status(&mut self) {
        let open = self.lines.iter().any(|l| l.status == LineStatus::ReturnRequested);
        if self.status == OrderStatus::ReturnRequested && !open {
            self.status = OrderStatus::Delivered;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutQuote;

    fn address() -> AddressSnapshot {
        AddressSnapshot {
            address_type: "Home".to_string(),
            name: "Asha".to_string(),
            street: "12 MG Road".to_string(),
            city: "Kochi".to_string(),
            landmark: None,
            state: "Kerala".to_string(),
            pincode: "682001".to_string(),
            phone: "9876543210".to_string(),
        }
    }

    fn item(product_id: &str, qty: i64, price_rupees: i64) -> CartItem {
        CartItem {
            id: format!("ci-{product_id}"),
            user_id: "u1".to_string(),
            product_id: product_id.to_string(),
            product_name: product_id.to_uppercase(),
            quantity: qty,
            unit_price_paise: price_rupees * 100,
            final_price_paise: price_rupees * 100,
            added_at: Utc::now(),
        }
    }

    fn quote(subtotal: i64, shipping: i64, coupon: i64) -> CheckoutQuote {
        CheckoutQuote {
            subtotal_paise: subtotal * 100,
            shipping_paise: shipping * 100,
            coupon_code: (coupon > 0).then(|| "SAVE10".to_string()),
            coupon_discount_paise: coupon * 100,
            total_paise: (subtotal + shipping - coupon) * 100,
        }
    }

    /// ₹400 + ₹600 lines, 10% coupon, free shipping, paid from wallet.
    fn paid_order() -> Order {
        Order::place(
            "u1",
            &[item("a", 1, 400), item("b", 2, 300)],
            address(),
            &quote(1000, 0, 100),
            PaymentMethod::Wallet,
        )
        .unwrap()
    }

    fn assert_balanced(order: &Order) {
        assert_eq!(
            order.order_amount() + Money::from_paise(order.refunded_paise),
            order.charged(),
            "order amount drifted"
        );
        assert!(!order.order_amount().is_negative());
    }

    fn deliver(order: &mut Order) {
        let now = Utc::now();
        order.advance(OrderStatus::Shipped, now).unwrap();
        order.advance(OrderStatus::OutForDelivery, now).unwrap();
        order.advance(OrderStatus::Delivered, now).unwrap();
    }

    #[test]
    fn test_place_initial_status_by_method() {
        let cod = Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Cod).unwrap();
        assert_eq!(cod.status, OrderStatus::Processing);
        assert_eq!(cod.payment_status, PaymentStatus::Pending);

        let online =
            Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Gateway).unwrap();
        assert_eq!(online.status, OrderStatus::Pending);
        assert_eq!(online.payment_status, PaymentStatus::Pending);

        let wallet = paid_order();
        assert_eq!(wallet.payment_status, PaymentStatus::Paid);
        assert_eq!(wallet.order_amount(), Money::from_rupees(900));
        assert!(wallet.lines.iter().all(|l| l.order_id == wallet.id));
    }

    #[test]
    fn test_place_rejects_empty_cart() {
        let err = Order::place("u1", &[], address(), &quote(0, 0, 0), PaymentMethod::Cod).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_cancel_line_proportional_refund() {
        let mut order = paid_order();
        let line_id = order.lines[0].id.clone();

        let settlement = order.cancel_line(&line_id, "changed mind", Utc::now()).unwrap();
        assert_eq!(settlement.refund, Money::from_rupees(360));
        assert_eq!(settlement.wallet_credit(), Some(Money::from_rupees(360)));
        assert_eq!(settlement.restock, vec![Restock { product_id: "a".to_string(), quantity: 1 }]);
        assert_eq!(order.order_amount(), Money::from_rupees(540));
        assert_eq!(order.status, OrderStatus::Processing);
        assert_balanced(&order);
    }

    #[test]
    fn test_cancel_line_twice_not_eligible() {
        let mut order = paid_order();
        let line_id = order.lines[0].id.clone();
        order.cancel_line(&line_id, "x", Utc::now()).unwrap();

        let err = order.cancel_line(&line_id, "x", Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::NotEligible { .. }));
        assert_eq!(order.order_amount(), Money::from_rupees(540));
    }

    #[test]
    fn test_cancel_last_line_settles_to_zero() {
        let mut order = paid_order();
        let first = order.lines[0].id.clone();
        let second = order.lines[1].id.clone();
        order.cancel_line(&first, "x", Utc::now()).unwrap();
        let settlement = order.cancel_line(&second, "y", Utc::now()).unwrap();

        assert_eq!(settlement.refund, Money::from_rupees(540));
        assert!(order.order_amount().is_zero());
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_balanced(&order);
    }

    #[test]
    fn test_cancel_line_after_shipping_not_eligible() {
        let mut order = paid_order();
        order.advance(OrderStatus::Shipped, Utc::now()).unwrap();
        let line_id = order.lines[0].id.clone();
        assert!(matches!(
            order.cancel_line(&line_id, "x", Utc::now()),
            Err(CoreError::NotEligible { .. })
        ));
    }

    #[test]
    fn test_cancel_unknown_line() {
        let mut order = paid_order();
        assert!(matches!(
            order.cancel_line("nope", "x", Utc::now()),
            Err(CoreError::LineNotFound { .. })
        ));
    }

    #[test]
    fn test_cancel_order_refunds_remaining_amount() {
        let mut order = paid_order();
        let line_id = order.lines[0].id.clone();
        order.cancel_line(&line_id, "x", Utc::now()).unwrap();

        let settlement = order.cancel("no longer needed", Utc::now()).unwrap();
        assert_eq!(settlement.refund, Money::from_rupees(540));
        assert_eq!(settlement.restock.len(), 1);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.lines.iter().all(|l| l.status == LineStatus::Cancelled));
        assert_balanced(&order);

        assert!(matches!(
            order.cancel("again", Utc::now()),
            Err(CoreError::NotEligible { .. })
        ));
    }

    #[test]
    fn test_cancel_unpaid_cod_order_credits_nothing() {
        let mut order =
            Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Cod).unwrap();
        let settlement = order.cancel("x", Utc::now()).unwrap();
        assert_eq!(settlement.refund, Money::from_rupees(150));
        assert_eq!(settlement.wallet_credit(), None);
    }

    #[test]
    fn test_cannot_cancel_after_delivery() {
        let mut order = paid_order();
        deliver(&mut order);
        assert!(matches!(order.cancel("x", Utc::now()), Err(CoreError::NotEligible { .. })));
    }

    #[test]
    fn test_advance_rules() {
        assert!(OrderStatus::Processing.can_advance_to(OrderStatus::Shipped));
        assert!(OrderStatus::Processing.can_advance_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.can_advance_to(OrderStatus::Processing));
        assert!(OrderStatus::OutForDelivery.can_advance_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_advance_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_advance_to(OrderStatus::Returned));
        assert!(!OrderStatus::Cancelled.can_advance_to(OrderStatus::Processing));
    }

    #[test]
    fn test_advance_to_cancelled_settles() {
        let mut order = paid_order();
        let settlement = order.advance(OrderStatus::Cancelled, Utc::now()).unwrap().unwrap();
        assert_eq!(settlement.refund, Money::from_rupees(900));
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_delivering_cod_marks_paid() {
        let mut order =
            Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Cod).unwrap();
        deliver(&mut order);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.delivered_at.is_some());
    }

    #[test]
    fn test_unpaid_gateway_order_cannot_ship() {
        let mut order =
            Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Gateway).unwrap();
        assert!(order.advance(OrderStatus::Shipped, Utc::now()).is_err());
    }

    #[test]
    fn test_cancel_unpaid_gateway_order_restocks_nothing() {
        let mut order =
            Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Gateway).unwrap();
        assert!(!order.stock_committed());

        let settlement = order.cancel("changed my mind", Utc::now()).unwrap();
        assert!(settlement.restock.is_empty());
        assert_eq!(settlement.wallet_credit(), None);
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_gateway_payment_transitions() {
        let mut order =
            Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Gateway).unwrap();
        order.fail_payment(Utc::now()).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Failed);

        order.retry_payment("order_R2", Utc::now()).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.gateway_order_id.as_deref(), Some("order_R2"));

        assert_eq!(order.confirm_payment("pay_1", "sig", Utc::now()).unwrap(), PaymentCapture::Fulfil);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Processing);

        assert!(order.confirm_payment("pay_1", "sig", Utc::now()).is_err());
        assert!(order.retry_payment("order_R3", Utc::now()).is_err());
    }

    #[test]
    fn test_late_payment_after_decline_is_accepted() {
        let mut order =
            Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Gateway).unwrap();
        order.fail_payment(Utc::now()).unwrap();

        assert_eq!(order.confirm_payment("pay_1", "sig", Utc::now()).unwrap(), PaymentCapture::Fulfil);
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[test]
    fn test_unpaid_gateway_order_keeps_its_lines() {
        let mut order = Order::place(
            "u1",
            &[item("a", 1, 400), item("b", 1, 600)],
            address(),
            &quote(1000, 0, 0),
            PaymentMethod::Gateway,
        )
        .unwrap();
        let line_id = order.lines[0].id.clone();

        assert!(matches!(
            order.cancel_line(&line_id, "x", Utc::now()),
            Err(CoreError::NotEligible { .. })
        ));
        assert_eq!(order.order_amount(), Money::from_rupees(1000));
        assert!(order.lines.iter().all(|l| l.status == LineStatus::Ordered));

        // Once paid, lines cancel as usual
        order.confirm_payment("pay_1", "sig", Utc::now()).unwrap();
        let settlement = order.cancel_line(&line_id, "x", Utc::now()).unwrap();
        assert_eq!(settlement.wallet_credit(), Some(Money::from_rupees(400)));
        assert_eq!(settlement.restock.len(), 1);
    }

    #[test]
    fn test_payment_landing_on_cancelled_order_is_refunded() {
        let mut order =
            Order::place("u1", &[item("a", 1, 100)], address(), &quote(100, 50, 0), PaymentMethod::Gateway).unwrap();
        order.cancel("changed my mind", Utc::now()).unwrap();

        let capture = order.confirm_payment("pay_1", "sig", Utc::now()).unwrap();
        assert_eq!(capture, PaymentCapture::Refund(Money::from_rupees(150)));
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_1"));
        assert_balanced(&order);

        // The same payment is not refunded twice
        assert!(order.confirm_payment("pay_1", "sig", Utc::now()).is_err());
    }

    #[test]
    fn test_return_single_line_then_approve() {
        let mut order = paid_order();
        deliver(&mut order);
        let line_id = order.lines[0].id.clone();

        let ids = order
            .request_return(&ReturnScope::Line(line_id.clone()), "defective", Utc::now())
            .unwrap();
        assert_eq!(ids, vec![line_id.clone()]);
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.line(&line_id).map(|l| l.status), Some(LineStatus::ReturnRequested));

        let settlement = order.approve_return(&ids, Utc::now()).unwrap();
        // 400 − 100 × 400/1000, no shipping on this order
        assert_eq!(settlement.refund, Money::from_rupees(360));
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_balanced(&order);

        // Second approval of the same lines is refused
        assert!(matches!(
            order.approve_return(&ids, Utc::now()),
            Err(CoreError::NotEligible { .. })
        ));
    }

    #[test]
    fn test_whole_order_return_refunds_everything() {
        let mut order =
            Order::place("u1", &[item("a", 1, 100), item("b", 1, 300)], address(), &quote(400, 50, 40), PaymentMethod::Cod)
                .unwrap();
        deliver(&mut order);

        let ids = order.request_return(&ReturnScope::WholeOrder, "wrong size", Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::ReturnRequested);

        let settlement = order.approve_return(&ids, Utc::now()).unwrap();
        assert_eq!(settlement.refund, Money::from_rupees(410));
        assert_eq!(settlement.wallet_credit(), Some(Money::from_rupees(410)));
        assert_eq!(order.status, OrderStatus::Returned);
        assert!(order.order_amount().is_zero());
        assert_balanced(&order);
    }

    #[test]
    fn test_reject_return_restores_lines() {
        let mut order = paid_order();
        deliver(&mut order);
        let ids = order.request_return(&ReturnScope::WholeOrder, "x", Utc::now()).unwrap();

        order.reject_return(&ids, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.lines.iter().all(|l| l.status == LineStatus::Ordered));
        assert!(order.reject_return(&ids, Utc::now()).is_err());

        // The lines can be returned again later
        assert!(order.request_return(&ReturnScope::WholeOrder, "again", Utc::now()).is_ok());
    }

    #[test]
    fn test_resolving_one_return_keeps_whole_order_return_open() {
        let mut order = paid_order();
        deliver(&mut order);
        let first = order.lines[0].id.clone();

        let single = order
            .request_return(&ReturnScope::Line(first.clone()), "scratched", Utc::now())
            .unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        let rest = order.request_return(&ReturnScope::WholeOrder, "wrong colour", Utc::now()).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(order.status, OrderStatus::ReturnRequested);

        order.reject_return(&single, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::ReturnRequested);

        order.approve_return(&rest, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.line(&first).map(|l| l.status), Some(LineStatus::Ordered));
        assert_balanced(&order);
    }

    #[test]
    fn test_approving_one_return_keeps_whole_order_return_open() {
        let mut order = paid_order();
        deliver(&mut order);
        let first = order.lines[0].id.clone();

        let single = order
            .request_return(&ReturnScope::Line(first), "scratched", Utc::now())
            .unwrap();
        let rest = order.request_return(&ReturnScope::WholeOrder, "wrong colour", Utc::now()).unwrap();

        order.approve_return(&single, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::ReturnRequested);

        order.approve_return(&rest, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Returned);
        assert!(order.order_amount().is_zero());
    }

    #[test]
    fn test_return_requires_delivery() {
        let mut order = paid_order();
        assert!(matches!(
            order.request_return(&ReturnScope::WholeOrder, "x", Utc::now()),
            Err(CoreError::NotEligible { .. })
        ));
    }

    #[test]
    fn test_return_after_line_cancel_marks_returned() {
        let mut order = paid_order();
        let first = order.lines[0].id.clone();
        order.cancel_line(&first, "x", Utc::now()).unwrap();
        deliver(&mut order);

        let ids = order.request_return(&ReturnScope::WholeOrder, "y", Utc::now()).unwrap();
        assert_eq!(ids.len(), 1);
        let settlement = order.approve_return(&ids, Utc::now()).unwrap();
        assert_eq!(settlement.refund, Money::from_rupees(540));
        assert_eq!(order.status, OrderStatus::Returned);
        assert_balanced(&order);
    }

    /// Odd amounts: every step keeps the money rule, and the last refund
    /// absorbs rounding so the order lands on exactly zero.
    #[test]
    fn test_rounding_never_drifts() {
        let mut order = Order::place(
            "u1",
            &[item("a", 1, 333), item("b", 1, 333), item("c", 1, 334)],
            address(),
            &quote(1000, 0, 77),
            PaymentMethod::Wallet,
        )
        .unwrap();
        let ids: Vec<String> = order.lines.iter().map(|l| l.id.clone()).collect();
        let mut refunded = Money::zero();
        for id in &ids {
            refunded += order.cancel_line(id, "x", Utc::now()).unwrap().refund;
            assert_balanced(&order);
        }
        assert_eq!(refunded, Money::from_rupees(923));
        assert!(order.order_amount().is_zero());
    }
}
