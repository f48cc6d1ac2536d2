//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Refunds make it worse: a coupon shared across three lines             │
//! │    ₹100.00 / 3 = ₹33.33 (×3 = ₹99.99)  → Lost ₹0.01!                   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    10000 paise / 3 = 3333 paise (×3 = 9999 paise)                       │
//! │    We KNOW we lost 1 paisa, and the last refund absorbs it             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::money::Money;
//!
//! // Create from paise (preferred)
//! let price = Money::from_paise(109_900); // ₹1099.00
//!
//! // Arithmetic operations
//! let doubled = price * 2;                     // ₹2198.00
//! let total = price + Money::from_rupees(50);  // ₹1149.00
//! assert_eq!(total.paise(), 114_900);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::DiscountRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (paise for INR).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative intermediate values while computing refunds
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                    Where Money is Used                                  │
/// │                                                                         │
/// │  Product.price_paise ──► Offer resolver ──► CartItem.final_price       │
/// │                                                                         │
/// │  Cart.subtotal ──► Shipping + Coupon ──► Order.order_amount             │
/// │                                                                         │
/// │  Order.order_amount ──► Refund math ──► Wallet credit                  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let price = Money::from_paise(1099); // Represents ₹10.99
    /// assert_eq!(price.paise(), 1099);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// assert_eq!(Money::from_rupees(500).paise(), 50_000);
    /// ```
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Returns the value in paise (smallest currency unit).
    ///
    /// This is also the amount handed to the payment gateway, which
    /// expects minor currency units.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion.
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the larger of `self` and zero.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// assert_eq!(Money::from_paise(-40).clamp_non_negative(), Money::zero());
    /// assert_eq!(Money::from_paise(40).clamp_non_negative().paise(), 40);
    /// ```
    #[inline]
    pub fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let unit_price = Money::from_paise(29_900);
    /// assert_eq!(unit_price.multiply_quantity(3).paise(), 89_700);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Calculates `self × rate`, rounded half-up to the nearest paisa.
    ///
    /// ## Implementation
    /// We use integer math: `(amount * bps + 5000) / 10000`
    /// The +5000 provides rounding (5000/10000 = 0.5)
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    /// use bazaar_core::types::DiscountRate;
    ///
    /// let subtotal = Money::from_rupees(1000);
    /// let discount = subtotal.percentage(DiscountRate::from_bps(1000)); // 10%
    /// assert_eq!(discount, Money::from_rupees(100));
    /// ```
    pub fn percentage(&self, rate: DiscountRate) -> Money {
        // Use i128 to prevent overflow on large amounts
        let amount = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_paise(amount as i64)
    }

    /// Returns the share of `self` that `part` represents out of `whole`:
    /// `self × part / whole`, rounded half-up.
    ///
    /// This is the apportionment primitive used by refunds: a shared cost
    /// (coupon discount, shipping) is split across lines by their value.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// // A ₹100 coupon on a ₹1000 order; this line is worth ₹400.
    /// let coupon = Money::from_rupees(100);
    /// let share = coupon.prorate(Money::from_rupees(400), Money::from_rupees(1000));
    /// assert_eq!(share, Money::from_rupees(40));
    /// ```
    ///
    /// A zero `whole` yields zero (nothing to apportion).
    pub fn prorate(&self, part: Money, whole: Money) -> Money {
        if whole.0 == 0 {
            return Money::zero();
        }
        let numerator = self.0 as i128 * part.0 as i128;
        let denominator = whole.0 as i128;
        // Round half away from zero
        let half = denominator.abs() / 2;
        let rounded = if (numerator >= 0) == (denominator > 0) {
            (numerator.abs() + half) / denominator.abs()
        } else {
            -((numerator.abs() + half) / denominator.abs())
        };
        Money::from_paise(rounded as i64)
    }

    /// Expresses `self` as a rate of `base`, in basis points, rounded half-up.
    ///
    /// Used to convert a fixed-amount offer into an equivalent percentage.
    /// Returns zero when `base` is not positive.
    pub fn rate_of(&self, base: Money) -> DiscountRate {
        if base.0 <= 0 || self.0 <= 0 {
            return DiscountRate::zero();
        }
        let bps = (self.0 as i128 * 10000 + base.0 as i128 / 2) / base.0 as i128;
        DiscountRate::from_bps(bps.min(u32::MAX as i128) as u32)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and notifications. Frontend formatting handles
/// localised display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paise() {
        let money = Money::from_paise(1099);
        assert_eq!(money.paise(), 1099);
        assert_eq!(money.rupees(), 10);
        assert_eq!(money.paise_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_paise(1099)), "₹10.99");
        assert_eq!(format!("{}", Money::from_rupees(5)), "₹5.00");
        assert_eq!(format!("{}", Money::from_paise(-550)), "-₹5.50");
        assert_eq!(format!("{}", Money::zero()), "₹0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_paise(1000);
        let b = Money::from_paise(500);

        assert_eq!((a + b).paise(), 1500);
        assert_eq!((a - b).paise(), 500);
        let result: Money = a * 3;
        assert_eq!(result.paise(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.paise(), 2000);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // ₹10.00 at 8.25% = ₹0.825 → ₹0.83
        let amount = Money::from_paise(1000);
        assert_eq!(amount.percentage(DiscountRate::from_bps(825)).paise(), 83);
    }

    #[test]
    fn test_prorate_by_value() {
        let coupon = Money::from_rupees(100);
        let share = coupon.prorate(Money::from_rupees(400), Money::from_rupees(1000));
        assert_eq!(share.paise(), 4000);

        // 100 paise split 1/3 → 33.33 → 33
        let odd = Money::from_paise(100).prorate(Money::from_paise(1), Money::from_paise(3));
        assert_eq!(odd.paise(), 33);

        // 2/3 → 66.67 → 67
        let odd = Money::from_paise(100).prorate(Money::from_paise(2), Money::from_paise(3));
        assert_eq!(odd.paise(), 67);
    }

    #[test]
    fn test_prorate_zero_whole() {
        let share = Money::from_rupees(50).prorate(Money::from_rupees(10), Money::zero());
        assert!(share.is_zero());
    }

    #[test]
    fn test_rate_of() {
        let rate = Money::from_rupees(100).rate_of(Money::from_rupees(1000));
        assert_eq!(rate.bps(), 1000);

        assert_eq!(Money::from_rupees(5).rate_of(Money::zero()).bps(), 0);
        // More than the base is still reported; callers cap it
        assert_eq!(Money::from_rupees(20).rate_of(Money::from_rupees(10)).bps(), 20000);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert!(Money::from_paise(-1).clamp_non_negative().is_zero());
        assert_eq!(Money::from_paise(7).clamp_non_negative().paise(), 7);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_paise(100).is_positive());
        assert!(Money::from_paise(-100).is_negative());
    }

    /// 100 paise split three ways loses a paisa; the refund path accounts for it.
    #[test]
    fn test_division_precision_loss_documented() {
        let one_third = Money::from_paise(100 / 3);
        let reconstructed: Money = one_third * 3;
        assert_eq!(reconstructed.paise(), 99);
        assert_eq!((Money::from_paise(100) - reconstructed).paise(), 1);
    }
}
