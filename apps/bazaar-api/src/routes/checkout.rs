//! # Checkout Routes
//!
//! ## Gateway Flow
//! ```text
//!  client                          bazaar-api                     gateway
//!    │ POST /checkout/orders          │                              │
//!    │ { payment_method: "gateway" }  │── create remote order ──────►│
//!    │◄── 201 { order, payment } ─────│                              │
//!    │                                                               │
//!    │──────────── pays on the gateway's hosted page ───────────────►│
//!    │                                                               │
//!    │ POST /checkout/verify          │                              │
//!    │ { gateway_order_id,            │  HMAC check, commit stock,   │
//!    │   payment_id, signature }      │  clear cart, notify          │
//!    │◄── 200 order (paid) ───────────│                              │
//! ```
//!
//! A dismissed payment goes to `/checkout/payment-failed`; the customer can
//! later try again through `/orders/{id}/retry-payment`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use bazaar_core::{CheckoutQuote, Coupon, Order};
use bazaar_orders::{PaymentConfirmation, PaymentRequest, PlaceOrderRequest, PlacedOrder};

use super::Customer;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub coupon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentFailedRequest {
    pub gateway_order_id: String,
}

pub async fn quote(
    State(state): State<AppState>,
    customer: Customer,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<CheckoutQuote>, ApiError> {
    let coupon = query.coupon.as_deref().filter(|c| !c.trim().is_empty());
    Ok(Json(state.services.checkout.quote(customer.id(), coupon).await?))
}

pub async fn available_coupons(
    State(state): State<AppState>,
    customer: Customer,
) -> Result<Json<Vec<Coupon>>, ApiError> {
    Ok(Json(state.services.checkout.available_coupons(customer.id()).await?))
}

pub async fn place_order(
    State(state): State<AppState>,
    customer: Customer,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>), ApiError> {
    let placed = state.services.checkout.place_order(&customer.0, &request).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    customer: Customer,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.services.checkout.verify_payment(&customer.0, &confirmation).await?))
}

pub async fn payment_failed(
    State(state): State<AppState>,
    customer: Customer,
    Json(request): Json<PaymentFailedRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .services
        .checkout
        .mark_payment_failed(customer.id(), &request.gateway_order_id)
        .await?;
    Ok(Json(order))
}

pub async fn retry_payment(
    State(state): State<AppState>,
    customer: Customer,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentRequest>, ApiError> {
    Ok(Json(state.services.checkout.retry_payment(customer.id(), &order_id).await?))
}
