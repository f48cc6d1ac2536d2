//! # Coupon Engine
//!
//! Validation and discount computation for promotional codes.
//!
//! ## Checks (in order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  is_active?            no  → Inactive                                   │
//! │  now > expires_at?     yes → Expired                                    │
//! │  times_used ≥ limit?   yes → UsageLimitReached   (global, when set)    │
//! │  user usage ≥ per-user limit?  yes → UsageLimitReached                 │
//! │  subtotal < minimum?   yes → MinimumNotMet                              │
//! │                                                                         │
//! │  Percentage: subtotal × rate, capped by max_discount when set          │
//! │  Flat:       min(amount, subtotal)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is a pure read. Recording a use is a database operation
//! that runs inside the order-creation transaction (see bazaar-db).

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CouponError;
use crate::money::Money;
use crate::types::DiscountRate;

/// Length of generated coupon codes.
pub const COUPON_CODE_LENGTH: usize = 8;

// =============================================================================
// Coupon
// =============================================================================

/// The two shapes a coupon discount can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CouponDiscount {
    Percentage {
        rate: DiscountRate,
        max_discount_paise: Option<i64>,
    },
    Flat { amount_paise: i64 },
}

/// A promotional code.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Coupon {
    pub id: String,
    pub name: String,
    /// Upper-case code customers type in.
    pub code: String,
    pub discount: CouponDiscount,
    /// Minimum cart subtotal in paise.
    pub minimum_paise: i64,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    /// Global cap on uses, if any.
    pub usage_limit: Option<i64>,
    pub usage_per_user_limit: i64,
    /// Global use counter.
    pub times_used: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    #[inline]
    pub fn minimum(&self) -> Money {
        Money::from_paise(self.minimum_paise)
    }

    /// Checks the coupon for `user_usage` prior uses by this user against
    /// a cart of `subtotal` at time `now`.
    pub fn validate(&self, user_usage: i64, subtotal: Money, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive(self.code.clone()));
        }
        if now > self.expires_at {
            return Err(CouponError::Expired(self.code.clone()));
        }
        if let Some(limit) = self.usage_limit {
            if self.times_used >= limit {
                return Err(CouponError::UsageLimitReached(self.code.clone()));
            }
        }
        if user_usage >= self.usage_per_user_limit {
            return Err(CouponError::UsageLimitReached(self.code.clone()));
        }
        if subtotal < self.minimum() {
            return Err(CouponError::MinimumNotMet {
                code: self.code.clone(),
                minimum: self.minimum(),
            });
        }
        Ok(())
    }

    /// Discount this coupon gives on `subtotal`. Never exceeds the subtotal.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let subtotal = subtotal.clamp_non_negative();
        let discount = match &self.discount {
            CouponDiscount::Percentage {
                rate,
                max_discount_paise,
            } => {
                let computed = subtotal.percentage(*rate);
                match max_discount_paise {
                    Some(cap) => computed.min(Money::from_paise(*cap)),
                    None => computed,
                }
            }
            CouponDiscount::Flat { amount_paise } => Money::from_paise(*amount_paise),
        };
        discount.clamp_non_negative().min(subtotal)
    }
}

/// Normalises user input to the stored code format.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Generates a coupon code: an upper-case letter followed by
/// `COUPON_CODE_LENGTH - 1` characters from `A-Z0-9`.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const CHARACTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    let mut code = String::with_capacity(COUPON_CODE_LENGTH);
    code.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
    for _ in 1..COUPON_CODE_LENGTH {
        code.push(CHARACTERS[rng.gen_range(0..CHARACTERS.len())] as char);
    }
    code
}

// =============================================================================
// Unit Tests
// =============================================================================
