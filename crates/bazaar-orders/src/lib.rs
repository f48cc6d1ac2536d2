//! # bazaar-orders: Order Lifecycle and Settlement Services
//!
//! Runs the bazaar-core rules against bazaar-db storage, one transaction
//! per operation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  bazaar-api (axum handlers)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 bazaar-orders (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  CartService      CheckoutService     OrderService              │   │
//! │  │  ReturnService    WalletService       CatalogService            │   │
//! │  │  AddressService                                                 │   │
//! │  │                                                                 │   │
//! │  │  collaborators: PaymentGateway, SignatureVerifier, Notifier     │   │
//! │  └──────────────┬───────────────────────────────┬──────────────────┘   │
//! │                 ▼                               ▼                      │
//! │        bazaar-core (rules)             bazaar-db (transactions)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Discipline
//!
//! Every operation that touches more than one of order, stock, wallet,
//! coupon usage or cart runs in a single transaction wrapped in
//! [`bazaar_db::with_retry`]. Domain errors abort the transaction and
//! surface unchanged; transient conflicts re-run the whole operation.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod orders;
pub mod returns;
mod settlement;
pub mod wallet;

use std::sync::Arc;

use bazaar_core::{CheckoutPolicy, CURRENCY, PENDING_GATEWAY_ORDER_TTL_HOURS};
use bazaar_db::{Database, RetryPolicy};

pub use address::{AddressService, NewAddress};
pub use cart::{CartService, CartView};
pub use catalog::{CatalogService, NewCoupon, NewOffer, NewProduct, PricedProduct};
pub use checkout::{
    CheckoutService, CustomerRef, PaymentConfirmation, PaymentRequest, PlaceOrderRequest, PlacedOrder,
};
pub use error::{ErrorKind, OrderError, OrderResult};
pub use gateway::{PaymentGateway, RazorpayGateway, RemoteOrder, SignatureVerifier, StubGateway};
pub use notify::{LogNotifier, Notifier, NotifyError, OrderSummary, RecordingNotifier};
pub use orders::{OrderService, SettledOrder};
pub use returns::{ReturnResolution, ReturnService};
pub use wallet::WalletService;

/// Business settings shared by the services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub checkout: CheckoutPolicy,
    pub currency: String,
    /// Unpaid gateway orders older than this are discarded at the next
    /// online checkout.
    pub pending_order_ttl: chrono::Duration,
    pub retry: RetryPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            checkout: CheckoutPolicy::default(),
            currency: CURRENCY.to_string(),
            pending_order_ttl: chrono::Duration::hours(PENDING_GATEWAY_ORDER_TTL_HOURS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Every service over one database.
#[derive(Clone)]
pub struct Services {
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub returns: ReturnService,
    pub wallet: WalletService,
    pub catalog: CatalogService,
    pub addresses: AddressService,
}

impl Services {
    pub fn new(
        db: Database,
        config: ServiceConfig,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let retry = config.retry;
        Services {
            cart: CartService::new(db.clone(), config.checkout, retry),
            orders: OrderService::new(db.clone(), retry),
            returns: ReturnService::new(db.clone(), retry),
            wallet: WalletService::new(db.clone()),
            catalog: CatalogService::new(db.clone(), retry),
            addresses: AddressService::new(db.clone()),
            checkout: CheckoutService::new(db, config, gateway, verifier, notifier),
        }
    }
}
