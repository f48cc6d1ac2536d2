//! # Cart Routes
//!
//! ```text
//!  POST   /cart/items               reserve stock, snapshot offer price
//!  PATCH  /cart/items/{product_id}  move the reservation by delta
//!  DELETE /cart/items/{product_id}  release the reservation
//!  GET    /cart                     items + quote (shipping, total)
//! ```

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bazaar_core::Cart;
use bazaar_orders::CartView;

use super::Customer;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub delta: i64,
}

#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: i64,
}

pub async fn view_cart(State(state): State<AppState>, customer: Customer) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.services.cart.view(customer.id()).await?))
}

pub async fn cart_count(State(state): State<AppState>, customer: Customer) -> Result<Json<CartCount>, ApiError> {
    let count = state.services.cart.count(customer.id()).await?;
    Ok(Json(CartCount { count }))
}

pub async fn add_item(
    State(state): State<AppState>,
    customer: Customer,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    debug!(user_id = %customer.id(), product_id = %request.product_id, "add_to_cart");
    let cart = state
        .services
        .cart
        .add_item(customer.id(), &request.product_id, request.quantity)
        .await?;
    Ok(Json(cart))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    customer: Customer,
    Path(product_id): Path<String>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .services
        .cart
        .update_quantity(customer.id(), &product_id, request.delta)
        .await?;
    Ok(Json(cart))
}

pub async fn remove_item(
    State(state): State<AppState>,
    customer: Customer,
    Path(product_id): Path<String>,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.services.cart.remove_item(customer.id(), &product_id).await?))
}
