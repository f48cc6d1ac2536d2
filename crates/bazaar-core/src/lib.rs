//! # bazaar-core: Pure Business Logic for Bazaar
//!
//! This crate holds the order-lifecycle and settlement rules of the
//! storefront as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    HTTP API (axum)                              │   │
//! │  │    cart, checkout, orders, returns, wallet, admin               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               bazaar-orders (services, transactions)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │ pricing │ │ coupon  │ │  order  │ │ wallet  │  │   │
//! │  │   │  Money  │ │ offers  │ │ engine  │ │  state  │ │ ledger  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog, address, cart and payment types
//! - [`money`] - Money type with integer arithmetic (paise)
//! - [`pricing`] - Best-offer price resolution
//! - [`coupon`] - Coupon validation and discount
//! - [`checkout`] - Shipping, coupon and COD rules for a new order
//! - [`order`] - Order and line state machine
//! - [`refund`] - Proportional refund apportionment
//! - [`returns`] - Return requests
//! - [`wallet`] - Wallet ledger rules
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::money::Money;
//! use bazaar_core::refund::RefundBasis;
//!
//! let basis = RefundBasis {
//!     items_total: Money::from_rupees(1000),
//!     shipping: Money::zero(),
//!     coupon_discount: Money::from_rupees(100),
//! };
//! assert_eq!(basis.cancellation(Money::from_rupees(400)), Money::from_rupees(360));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod coupon;
pub mod error;
pub mod money;
pub mod order;
pub mod pricing;
pub mod refund;
pub mod returns;
pub mod types;
pub mod validation;
pub mod wallet;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{CheckoutPolicy, CheckoutQuote};
pub use coupon::{Coupon, CouponDiscount};
pub use error::{CoreError, CoreResult, CouponError, ValidationError};
pub use money::Money;
pub use order::{
    LineStatus, Order, OrderLine, OrderStatus, PaymentCapture, Restock, ReturnScope, Settlement,
};
pub use pricing::{Offer, OfferDiscount, OfferSource, PriceBreakdown};
pub use returns::{ReturnItem, ReturnRequest, ReturnStatus};
pub use types::*;
pub use wallet::{TransactionKind, Wallet, WalletSummary, WalletTransaction};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single product in a cart.
///
/// ## Business Reason
/// Stops bulk buying of limited stock by one customer.
pub const MAX_ITEM_QUANTITY: i64 = 10;

/// Currency all amounts are in.
pub const CURRENCY: &str = "INR";

/// Gateway orders still unpaid after this many hours are discarded on the
/// user's next online checkout.
pub const PENDING_GATEWAY_ORDER_TTL_HOURS: i64 = 24;
