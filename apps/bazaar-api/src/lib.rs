//! # Bazaar API
//!
//! HTTP surface over the order lifecycle and settlement services.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Storefront (X-User-Id, X-User-Email)                                  │
//! │    /api/products            catalog with resolved prices               │
//! │    /api/cart                add / update / remove, view with quote     │
//! │    /api/checkout            quote, coupons, place, verify, fail        │
//! │    /api/orders              list, get, cancel, cancel line, return     │
//! │    /api/returns             the customer's return requests             │
//! │    /api/wallet              balance and ledger                         │
//! │    /api/addresses           address book                               │
//! │                                                                         │
//! │  Back office (X-User-Role: admin)                                      │
//! │    /api/admin/orders        list, get, status, cancel line             │
//! │    /api/admin/returns       queue, approve, reject                     │
//! │    /api/admin/products      add, restock, list/unlist                  │
//! │    /api/admin/offers        add                                        │
//! │    /api/admin/coupons       create, list, activate                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authentication happens upstream; handlers trust the identity headers
//! the gateway proxy sets.

pub mod config;
pub mod error;
pub mod routes;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use bazaar_orders::Services;

pub use config::{BazaarConfig, ConfigError};
pub use error::{ApiError, ErrorCode};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        AppState { services }
    }
}

/// Builds the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({ "status": "healthy", "service": "bazaar-api" })) }),
        )
        .nest("/api", routes::storefront())
        .nest("/api/admin", routes::admin())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
