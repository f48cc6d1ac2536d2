//! # Domain Types
//!
//! Catalog, address and cart types used throughout Bazaar.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Address      │   │      Cart       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  user_id        │       │
//! │  │  category_id    │   │  user_id        │   │  items[]        │       │
//! │  │  price_paise    │   │  pincode, phone │   │   product_id    │       │
//! │  │  stock/reserved │   │  ──► snapshot   │   │   final_price   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  DiscountRate   │   │ PaymentMethod   │   │ PaymentStatus   │       │
//! │  │  bps (u32)      │   │  Cod            │   │  Pending        │       │
//! │  │  1000 = 10%     │   │  Wallet         │   │  Paid           │       │
//! │  └─────────────────┘   │  Gateway        │   │  Failed         │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Order, coupon, offer, wallet and return types live in their own modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so `1250` = 12.5% without floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// 100%.
    pub const FULL: DiscountRate = DiscountRate(10_000);

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a rate from whole percent.
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        DiscountRate(pct * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Caps the rate at 100%.
    #[inline]
    pub fn capped(self) -> Self {
        self.min(DiscountRate::FULL)
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product listed in the catalog.
///
/// Only the fields the order core needs are modelled here; catalog
/// administration (images, descriptions, brands) lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, frozen into order lines at purchase.
    pub name: String,

    /// Category used to look up category-level offers.
    pub category_id: String,

    /// Base price in paise.
    pub price_paise: i64,

    /// Product-level discount in basis points.
    pub discount_bps: u32,

    /// Units physically on hand.
    pub stock: i64,

    /// Units held by carts. `stock - reserved` is available to new carts.
    pub reserved: i64,

    /// Whether the product can be added to carts.
    pub is_listed: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the base price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }

    /// Returns the product-level discount.
    #[inline]
    pub fn discount_rate(&self) -> DiscountRate {
        DiscountRate::from_bps(self.discount_bps)
    }

    /// Units a new cart may still reserve.
    #[inline]
    pub fn available(&self) -> i64 {
        (self.stock - self.reserved).max(0)
    }
}

// =============================================================================
// Address
// =============================================================================

/// A saved delivery address in a user's address book.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Address {
    pub id: String,
    pub user_id: String,
    /// "Home", "Work", ...
    pub address_type: String,
    pub name: String,
    pub street: String,
    pub city: String,
    pub landmark: Option<String>,
    pub state: String,
    pub pincode: String,
    pub phone: String,
    pub is_default: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// Copies the address into the form stored on an order.
    ///
    /// Later edits to the address book never touch placed orders.
    pub fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot {
            address_type: self.address_type.clone(),
            name: self.name.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            landmark: self.landmark.clone(),
            state: self.state.clone(),
            pincode: self.pincode.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Denormalized delivery address stored on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AddressSnapshot {
    pub address_type: String,
    pub name: String,
    pub street: String,
    pub city: String,
    pub landmark: Option<String>,
    pub state: String,
    pub pincode: String,
    pub phone: String,
}

// =============================================================================
// Payment Method / Status
// =============================================================================

/// How an order is paid for.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    /// Debited from the user's wallet at placement.
    Wallet,
    /// Online payment through the external gateway.
    Gateway,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Gateway => "gateway",
        }
    }
}

/// Whether the money for an order has been collected.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One product in a user's cart, with the price captured when it was added.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartItem {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    /// Product name (joined for display).
    pub product_name: String,
    pub quantity: i64,
    /// Base price when added.
    pub unit_price_paise: i64,
    /// Best-offer price when added. This is what the customer pays.
    pub final_price_paise: i64,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    #[inline]
    pub fn final_price(&self) -> Money {
        Money::from_paise(self.final_price_paise)
    }

    /// `final_price × quantity`.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.final_price().multiply_quantity(self.quantity)
    }
}

/// A user's working set before checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub user_id: String,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of line totals at the captured prices.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn item(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_item(product_id: &str, qty: i64, final_price: i64) -> CartItem {
        CartItem {
            id: format!("ci-{product_id}"),
            user_id: "u1".to_string(),
            product_id: product_id.to_string(),
            product_name: product_id.to_uppercase(),
            quantity: qty,
            unit_price_paise: final_price,
            final_price_paise: final_price,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_rate() {
        let rate = DiscountRate::from_percent(10);
        assert_eq!(rate.bps(), 1000);
        assert!((rate.percentage() - 10.0).abs() < 0.001);
        assert_eq!(DiscountRate::from_bps(15_000).capped(), DiscountRate::FULL);
    }

    #[test]
    fn test_cart_subtotal_and_count() {
        let cart = Cart {
            user_id: "u1".to_string(),
            items: vec![cart_item("a", 2, 20_000), cart_item("b", 1, 60_000)],
        };
        assert_eq!(cart.subtotal(), Money::from_rupees(1000));
        assert_eq!(cart.item_count(), 3);
        assert!(cart.item("b").is_some());
        assert!(cart.item("c").is_none());
    }

    #[test]
    fn test_product_available() {
        let now = Utc::now();
        let product = Product {
            id: "p1".to_string(),
            name: "Aspire 7".to_string(),
            category_id: "laptops".to_string(),
            price_paise: 5_000_000,
            discount_bps: 0,
            stock: 5,
            reserved: 2,
            is_listed: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(product.available(), 3);
    }

    #[test]
    fn test_payment_status_default() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }
}
