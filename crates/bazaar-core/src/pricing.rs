//! # Pricing / Offer Resolver
//!
//! Computes the price a customer pays for one unit of a product.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Candidates (each expressed as a rate of the base price)               │
//! │                                                                         │
//! │  Product level:  product.discount_bps                                  │
//! │                  + live offers that target the product                 │
//! │                                                                         │
//! │  Category level: live offers that target the product's category        │
//! │                                                                         │
//! │  Percentage offer  → min(base × rate, max_discount) / base             │
//! │  Fixed offer       → min(amount, max_discount) / base                  │
//! │                                                                         │
//! │  best = max(product, category), capped at 100%                         │
//! │  final = base − base × best  (never below zero)                        │
//! │  ties go to the product-level candidate                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use bazaar_core::pricing::{best_price, OfferSource};
//! # use bazaar_core::Product;
//! # use chrono::Utc;
//! # let now = Utc::now();
//! # let product = Product {
//! #     id: "p1".into(), name: "Aspire 7".into(), category_id: "laptops".into(),
//! #     price_paise: 100_000, discount_bps: 500, stock: 1, reserved: 0,
//! #     is_listed: true, created_at: now, updated_at: now,
//! # };
//! let price = best_price(&product, &[], now);
//! assert_eq!(price.final_price_paise, 95_000);
//! assert_eq!(price.applied_offer, OfferSource::Product);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{DiscountRate, Product};

// =============================================================================
// Offer
// =============================================================================

/// How an offer discounts a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfferDiscount {
    /// A share of the base price, optionally capped at an absolute amount.
    Percentage {
        rate: DiscountRate,
        max_discount_paise: Option<i64>,
    },
    /// A flat amount off the base price, optionally capped as well.
    Fixed {
        amount_paise: i64,
        #[serde(default)]
        max_discount_paise: Option<i64>,
    },
}

/// A time-boxed promotional offer on categories and/or products.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Offer {
    pub id: String,
    pub name: String,
    pub discount: OfferDiscount,
    pub category_ids: Vec<String>,
    pub product_ids: Vec<String>,
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Offer {
    /// Active and `starts_at <= now <= ends_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }

    pub fn targets_category(&self, category_id: &str) -> bool {
        self.category_ids.iter().any(|c| c == category_id)
    }

    pub fn targets_product(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|p| p == product_id)
    }

    /// The discount this offer gives on `base`, as a rate of `base`.
    pub fn effective_rate(&self, base: Money) -> DiscountRate {
        let (amount, cap) = match &self.discount {
            OfferDiscount::Percentage {
                rate,
                max_discount_paise,
            } => (base.percentage(*rate), *max_discount_paise),
            OfferDiscount::Fixed {
                amount_paise,
                max_discount_paise,
            } => (Money::from_paise(*amount_paise), *max_discount_paise),
        };
        let capped = match cap {
            Some(cap) => amount.min(Money::from_paise(cap)),
            None => amount,
        };
        capped.rate_of(base)
    }
}

// =============================================================================
// Price Breakdown
// =============================================================================

/// Which kind of candidate won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OfferSource {
    Product,
    Category,
    None,
}

/// Result of resolving the best price for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceBreakdown {
    pub original_price_paise: i64,
    pub final_price_paise: i64,
    pub discount_paise: i64,
    pub discount_rate: DiscountRate,
    pub applied_offer: OfferSource,
}

impl PriceBreakdown {
    #[inline]
    pub fn final_price(&self) -> Money {
        Money::from_paise(self.final_price_paise)
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Computes the best unit price for `product` given the candidate `offers`.
///
/// `offers` may contain offers for other products or categories, and
/// inactive or expired ones; only live offers targeting this product or its
/// category are considered.
pub fn best_price(product: &Product, offers: &[Offer], now: DateTime<Utc>) -> PriceBreakdown {
    let base = product.price();

    if !base.is_positive() {
        return PriceBreakdown {
            original_price_paise: base.paise(),
            final_price_paise: 0,
            discount_paise: 0,
            discount_rate: DiscountRate::zero(),
            applied_offer: OfferSource::None,
        };
    }

    let live = offers.iter().filter(|o| o.is_live(now));

    let mut product_rate = product.discount_rate();
    let mut category_rate = DiscountRate::zero();
    for offer in live {
        let rate = offer.effective_rate(base);
        if offer.targets_product(&product.id) {
            product_rate = product_rate.max(rate);
        }
        if offer.targets_category(&product.category_id) {
            category_rate = category_rate.max(rate);
        }
    }

    let (best, source) = if product_rate >= category_rate && !product_rate.is_zero() {
        (product_rate, OfferSource::Product)
    } else if !category_rate.is_zero() {
        (category_rate, OfferSource::Category)
    } else {
        (DiscountRate::zero(), OfferSource::None)
    };

    let rate = best.capped();
    let discount = base.percentage(rate).min(base);
    let final_price = (base - discount).clamp_non_negative();

    PriceBreakdown {
        original_price_paise: base.paise(),
        final_price_paise: final_price.paise(),
        discount_paise: discount.paise(),
        discount_rate: rate,
        applied_offer: source,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn product(price_paise: i64, discount_bps: u32) -> Product {
        let now = Utc::now();
        Product {
            id: "p1".to_string(),
            name: "Aspire 7".to_string(),
            category_id: "laptops".to_string(),
            price_paise,
            discount_bps,
            stock: 10,
            reserved: 0,
            is_listed: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn category_offer(discount: OfferDiscount) -> Offer {
        let now = Utc::now();
        Offer {
            id: "o1".to_string(),
            name: "Festive".to_string(),
            discount,
            category_ids: vec!["laptops".to_string()],
            product_ids: vec![],
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            is_active: true,
        }
    }

    #[test]
    fn test_no_offers_keeps_base_price() {
        let price = best_price(&product(50_000, 0), &[], Utc::now());
        assert_eq!(price.final_price_paise, 50_000);
        assert_eq!(price.discount_paise, 0);
        assert_eq!(price.applied_offer, OfferSource::None);
    }

    #[test]
    fn test_category_offer_beats_smaller_product_discount() {
        let offer = category_offer(OfferDiscount::Percentage {
            rate: DiscountRate::from_percent(20),
            max_discount_paise: None,
        });
        let price = best_price(&product(100_000, 1000), &[offer], Utc::now());
        assert_eq!(price.final_price_paise, 80_000);
        assert_eq!(price.discount_rate.bps(), 2000);
        assert_eq!(price.applied_offer, OfferSource::Category);
    }

    #[test]
    fn test_percentage_offer_capped_by_max_discount() {
        // 50% of ₹1000 = ₹500, capped at ₹100 → 10%
        let offer = category_offer(OfferDiscount::Percentage {
            rate: DiscountRate::from_percent(50),
            max_discount_paise: Some(10_000),
        });
        let price = best_price(&product(100_000, 0), &[offer], Utc::now());
        assert_eq!(price.discount_rate.bps(), 1000);
        assert_eq!(price.final_price_paise, 90_000);
    }

    #[test]
    fn test_fixed_offer_converted_to_rate() {
        let offer = category_offer(OfferDiscount::Fixed {
            amount_paise: 25_000,
            max_discount_paise: None,
        });
        let price = best_price(&product(100_000, 0), &[offer], Utc::now());
        assert_eq!(price.discount_rate.bps(), 2500);
        assert_eq!(price.final_price_paise, 75_000);
    }

    #[test]
    fn test_fixed_offer_capped_by_max_discount() {
        // ₹300 off, capped at ₹200 → 20%
        let offer = category_offer(OfferDiscount::Fixed {
            amount_paise: 30_000,
            max_discount_paise: Some(20_000),
        });
        let price = best_price(&product(100_000, 0), &[offer], Utc::now());
        assert_eq!(price.discount_rate.bps(), 2000);
        assert_eq!(price.final_price_paise, 80_000);
    }

    #[test]
    fn test_fixed_offer_larger_than_price_never_negative() {
        let offer = category_offer(OfferDiscount::Fixed {
            amount_paise: 500_000,
            max_discount_paise: None,
        });
        let price = best_price(&product(100_000, 0), &[offer], Utc::now());
        assert_eq!(price.final_price_paise, 0);
        assert_eq!(price.discount_paise, 100_000);
        assert_eq!(price.discount_rate, DiscountRate::FULL);
    }

    #[test]
    fn test_tie_goes_to_product() {
        let offer = category_offer(OfferDiscount::Percentage {
            rate: DiscountRate::from_percent(10),
            max_discount_paise: None,
        });
        let price = best_price(&product(100_000, 1000), &[offer], Utc::now());
        assert_eq!(price.applied_offer, OfferSource::Product);
    }

    #[test]
    fn test_expired_and_inactive_offers_ignored() {
        let mut expired = category_offer(OfferDiscount::Fixed {
            amount_paise: 10_000,
            max_discount_paise: None,
        });
        expired.ends_at = Utc::now() - Duration::hours(1);
        let mut inactive = category_offer(OfferDiscount::Fixed {
            amount_paise: 10_000,
            max_discount_paise: None,
        });
        inactive.is_active = false;

        let price = best_price(&product(100_000, 0), &[expired, inactive], Utc::now());
        assert_eq!(price.applied_offer, OfferSource::None);
        assert_eq!(price.final_price_paise, 100_000);
    }

    #[test]
    fn test_offer_targeting_product_counts_as_product_level() {
        let mut offer = category_offer(OfferDiscount::Percentage {
            rate: DiscountRate::from_percent(15),
            max_discount_paise: None,
        });
        offer.category_ids.clear();
        offer.product_ids = vec!["p1".to_string()];
        let price = best_price(&product(100_000, 0), &[offer], Utc::now());
        assert_eq!(price.applied_offer, OfferSource::Product);
        assert_eq!(price.final_price_paise, 85_000);
    }

    #[test]
    fn test_zero_base_price() {
        let price = best_price(&product(0, 5000), &[], Utc::now());
        assert_eq!(price.final_price_paise, 0);
        assert_eq!(price.applied_offer, OfferSource::None);
    }
}
