//! # Proportional Refunds
//!
//! Shared costs on an order (coupon discount, shipping) are apportioned to
//! lines by value, so a refund never exceeds what the customer paid for the
//! refunded items.
//!
//! ## Formulas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  T_i = line total     ΣT = item total of the whole order               │
//! │  C   = coupon discount    S = shipping charge                          │
//! │                                                                         │
//! │  Line cancellation (before delivery, shipping not refunded):           │
//! │     refund_i = T_i − round(C × T_i / ΣT)                               │
//! │                                                                         │
//! │  Return of a batch of delivered lines:                                 │
//! │     refund = Σ_i ( T_i + round(S × T_i / ΣT) − round(C × T_i / ΣT) )   │
//! │                                                                         │
//! │  Both clamped to ≥ 0. The caller further clamps to the order's         │
//! │  remaining amount and gives the final active line the exact remainder.│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Worked Example
//! Subtotal ₹1000 (lines ₹400 + ₹600), 10% coupon (₹100), free shipping.
//! Cancelling the ₹400 line refunds `400 − 100 × 400/1000 = ₹360`.

use crate::money::Money;

/// The order-level amounts refunds are apportioned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundBasis {
    /// ΣT over every line of the order, including cancelled ones.
    pub items_total: Money,
    pub shipping: Money,
    pub coupon_discount: Money,
}

impl RefundBasis {
    /// Refund for cancelling one line before delivery.
    pub fn cancellation(&self, line_total: Money) -> Money {
        let coupon_share = self.coupon_discount.prorate(line_total, self.items_total);
        (line_total - coupon_share).clamp_non_negative()
    }

    /// Refund for returning a batch of delivered lines.
    pub fn batch_return<I>(&self, line_totals: I) -> Money
    where
        I: IntoIterator<Item = Money>,
    {
        line_totals
            .into_iter()
            .map(|t| {
                let shipping_share = self.shipping.prorate(t, self.items_total);
                let coupon_share = self.coupon_discount.prorate(t, self.items_total);
                t + shipping_share - coupon_share
            })
            .sum::<Money>()
            .clamp_non_negative()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
