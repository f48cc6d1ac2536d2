//! # HTTP Routes
//!
//! ```text
//! routes/
//! ├── mod.rs       ◄─── router assembly, identity extractors
//! ├── catalog.rs   ◄─── product listing
//! ├── cart.rs      ◄─── cart manipulation
//! ├── checkout.rs  ◄─── quote, placement, gateway callbacks
//! ├── orders.rs    ◄─── customer order history, cancellation, returns
//! ├── account.rs   ◄─── wallet and address book
//! └── admin.rs     ◄─── back office
//! ```

mod account;
mod admin;
mod cart;
mod catalog;
mod checkout;
mod orders;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use bazaar_orders::CustomerRef;

use crate::error::ApiError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

pub(crate) fn storefront() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{product_id}", get(catalog::get_product))
        .route("/cart", get(cart::view_cart))
        .route("/cart/count", get(cart::cart_count))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/{product_id}",
            patch(cart::update_quantity).delete(cart::remove_item),
        )
        .route("/checkout/quote", get(checkout::quote))
        .route("/checkout/coupons", get(checkout::available_coupons))
        .route("/checkout/orders", post(checkout::place_order))
        .route("/checkout/verify", post(checkout::verify_payment))
        .route("/checkout/payment-failed", post(checkout::payment_failed))
        .route("/orders", get(orders::list_orders))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/cancel", post(orders::cancel_order))
        .route("/orders/{order_id}/lines/{line_id}/cancel", post(orders::cancel_line))
        .route("/orders/{order_id}/returns", post(orders::request_return))
        .route("/orders/{order_id}/retry-payment", post(checkout::retry_payment))
        .route("/returns", get(orders::list_returns))
        .route("/wallet", get(account::wallet))
        .route("/addresses", get(account::list_addresses).post(account::add_address))
        .route("/addresses/{address_id}", delete(account::delete_address))
}

pub(crate) fn admin() -> Router<AppState> {
    Router::new()
        .route("/orders", get(admin::list_orders))
        .route("/orders/{order_id}", get(admin::get_order))
        .route("/orders/{order_id}/status", post(admin::update_status))
        .route("/orders/{order_id}/lines/{line_id}/cancel", post(admin::cancel_line))
        .route("/returns", get(admin::list_returns))
        .route("/returns/{return_id}/approve", post(admin::approve_return))
        .route("/returns/{return_id}/reject", post(admin::reject_return))
        .route("/products", post(admin::add_product))
        .route("/products/{product_id}/restock", post(admin::restock))
        .route("/products/{product_id}/listed", post(admin::set_listed))
        .route("/offers", post(admin::add_offer))
        .route("/coupons", get(admin::list_coupons).post(admin::create_coupon))
        .route("/coupons/{coupon_id}/active", post(admin::set_coupon_active))
}

/// The signed-in customer, as forwarded by the auth proxy.
#[derive(Debug, Clone)]
pub struct Customer(pub CustomerRef);

impl Customer {
    pub fn id(&self) -> &str {
        &self.0.user_id
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for Customer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("Sign in to continue"))?;
        let email = header(parts, USER_EMAIL_HEADER).unwrap_or_default();
        Ok(Customer(CustomerRef::new(user_id, email)))
    }
}

/// A back-office user.
#[derive(Debug, Clone, Copy)]
pub struct Admin;

impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match header(parts, USER_ROLE_HEADER) {
            Some(role) if role.eq_ignore_ascii_case("admin") => Ok(Admin),
            _ => Err(ApiError::unauthorized("Admin access required")),
        }
    }
}
