//! # Repository Module
//!
//! Database repository implementations for Bazaar.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Kinds of Repository Functions                    │
//! │                                                                         │
//! │  Reads and standalone writes take &self and use the pool:             │
//! │                                                                         │
//! │      db.orders().list_for_user("u1").await?                            │
//! │                                                                         │
//! │  Writes that must commit together are associated functions taking     │
//! │  a connection, so the caller decides the transaction boundary:         │
//! │                                                                         │
//! │      let mut tx = db.begin().await?;                                   │
//! │      ProductRepository::adjust_stock(&mut tx, "p1", -2).await?;        │
//! │      OrderRepository::insert(&mut tx, &order).await?;                  │
//! │      tx.commit().await?;                                               │
//! │                                                                         │
//! │  Every stock, balance and usage-count change is a conditional UPDATE  │
//! │  whose rows_affected tells the caller whether the guard held.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Catalog, stock and cart reservations
//! - [`OfferRepository`] - Time-boxed product and category offers
//! - [`AddressRepository`] - Customer address book
//! - [`CartRepository`] - Cart lines
//! - [`CouponRepository`] - Coupons and per-user usage counts
//! - [`OrderRepository`] - Orders and their lines
//! - [`WalletRepository`] - Wallet balances and the transaction ledger
//! - [`ReturnRepository`] - Return requests

pub mod address;
pub mod cart;
pub mod coupon;
pub mod offer;
pub mod order;
pub mod product;
pub mod return_request;
pub mod wallet;

pub use address::AddressRepository;
pub use cart::CartRepository;
pub use coupon::CouponRepository;
pub use offer::OfferRepository;
pub use order::{OrderFilter, OrderRepository};
pub use product::ProductRepository;
pub use return_request::ReturnRepository;
pub use wallet::{DebitOutcome, WalletRepository};
