//! # Checkout Quote
//!
//! Turns a cart subtotal and an optional coupon into the amounts an order is
//! created with.
//!
//! ```text
//! subtotal ──► shipping (free above threshold) ──► coupon ──► total
//!                                                              │
//!                                  COD allowed only up to ceiling
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::coupon::Coupon;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::PaymentMethod;

/// Store-wide checkout rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutPolicy {
    /// Flat shipping fee.
    pub shipping_charge: Money,
    /// Shipping is free when the subtotal is strictly above this.
    pub free_shipping_above: Money,
    /// Cash on delivery is refused when the total is strictly above this.
    pub cod_limit: Money,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        CheckoutPolicy {
            shipping_charge: Money::from_rupees(50),
            free_shipping_above: Money::from_rupees(500),
            cod_limit: Money::from_rupees(4000),
        }
    }
}

impl CheckoutPolicy {
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal > self.free_shipping_above {
            Money::zero()
        } else {
            self.shipping_charge
        }
    }

    /// Builds a quote. `coupon` carries the coupon and how many times this
    /// user has already used it.
    pub fn quote(&self, subtotal: Money, coupon: Option<(&Coupon, i64)>, now: DateTime<Utc>) -> CoreResult<CheckoutQuote> {
        let shipping = self.shipping_for(subtotal);
        let (code, discount) = match coupon {
            Some((coupon, user_usage)) => {
                coupon.validate(user_usage, subtotal, now)?;
                (Some(coupon.code.clone()), coupon.discount_for(subtotal))
            }
            None => (None, Money::zero()),
        };
        let total = (subtotal + shipping - discount).clamp_non_negative();

        Ok(CheckoutQuote {
            subtotal_paise: subtotal.paise(),
            shipping_paise: shipping.paise(),
            coupon_code: code,
            coupon_discount_paise: discount.paise(),
            total_paise: total.paise(),
        })
    }

    /// Refuses payment methods the total does not qualify for.
    pub fn ensure_method_allowed(&self, method: PaymentMethod, quote: &CheckoutQuote) -> CoreResult<()> {
        if method == PaymentMethod::Cod && quote.total() > self.cod_limit {
            return Err(CoreError::not_eligible(
                "Payment method",
                method.as_str(),
                format!("cash on delivery is not available for orders above {}", self.cod_limit),
            ));
        }
        Ok(())
    }
}

/// Amounts an order is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutQuote {
    pub subtotal_paise: i64,
    pub shipping_paise: i64,
    pub coupon_code: Option<String>,
    pub coupon_discount_paise: i64,
    pub total_paise: i64,
}

impl CheckoutQuote {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
