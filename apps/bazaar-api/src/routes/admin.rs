//! # Back Office Routes
//!
//! Order fulfilment, the return queue and catalog upkeep. Every handler
//! takes the [`Admin`] extractor, so requests without the admin role never
//! reach a service.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use bazaar_core::{Coupon, Offer, Order, OrderStatus, Product, ReturnRequest, ReturnStatus};
use bazaar_db::OrderFilter;
use bazaar_orders::{NewCoupon, NewOffer, NewProduct, ReturnResolution, SettledOrder};

use super::Admin;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    pub status: Option<ReturnStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct CancelLineRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListedRequest {
    pub listed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

// =============================================================================
// Orders
// =============================================================================

pub async fn list_orders(
    State(state): State<AppState>,
    _admin: Admin,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let filter = OrderFilter {
        status: query.status,
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(state.services.orders.list(&filter).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    _admin: Admin,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.services.orders.get(&order_id).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    _admin: Admin,
    Path(order_id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<SettledOrder>, ApiError> {
    Ok(Json(state.services.orders.update_status(&order_id, body.status).await?))
}

pub async fn cancel_line(
    State(state): State<AppState>,
    _admin: Admin,
    Path((order_id, line_id)): Path<(String, String)>,
    Json(body): Json<CancelLineRequest>,
) -> Result<Json<SettledOrder>, ApiError> {
    let settled = state
        .services
        .orders
        .cancel_line_for_store(&order_id, &line_id, &body.reason)
        .await?;
    Ok(Json(settled))
}

// =============================================================================
// Returns
// =============================================================================

pub async fn list_returns(
    State(state): State<AppState>,
    _admin: Admin,
    Query(query): Query<ReturnQuery>,
) -> Result<Json<Vec<ReturnRequest>>, ApiError> {
    Ok(Json(state.services.returns.list(query.status).await?))
}

pub async fn approve_return(
    State(state): State<AppState>,
    _admin: Admin,
    Path(return_id): Path<String>,
) -> Result<Json<ReturnResolution>, ApiError> {
    Ok(Json(state.services.returns.approve(&return_id).await?))
}

pub async fn reject_return(
    State(state): State<AppState>,
    _admin: Admin,
    Path(return_id): Path<String>,
) -> Result<Json<ReturnResolution>, ApiError> {
    Ok(Json(state.services.returns.reject(&return_id).await?))
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn add_product(
    State(state): State<AppState>,
    _admin: Admin,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.services.catalog.add_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn restock(
    State(state): State<AppState>,
    _admin: Admin,
    Path(product_id): Path<String>,
    Json(body): Json<RestockRequest>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.services.catalog.restock(&product_id, body.quantity).await?))
}

pub async fn set_listed(
    State(state): State<AppState>,
    _admin: Admin,
    Path(product_id): Path<String>,
    Json(body): Json<ListedRequest>,
) -> Result<StatusCode, ApiError> {
    state.services.catalog.set_listed(&product_id, body.listed).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_offer(
    State(state): State<AppState>,
    _admin: Admin,
    Json(input): Json<NewOffer>,
) -> Result<(StatusCode, Json<Offer>), ApiError> {
    let offer = state.services.catalog.add_offer(input).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn list_coupons(State(state): State<AppState>, _admin: Admin) -> Result<Json<Vec<Coupon>>, ApiError> {
    Ok(Json(state.services.catalog.list_coupons().await?))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    _admin: Admin,
    Json(input): Json<NewCoupon>,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    let coupon = state.services.catalog.create_coupon(input).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

pub async fn set_coupon_active(
    State(state): State<AppState>,
    _admin: Admin,
    Path(coupon_id): Path<String>,
    Json(body): Json<ActiveRequest>,
) -> Result<StatusCode, ApiError> {
    state.services.catalog.set_coupon_active(&coupon_id, body.active).await?;
    Ok(StatusCode::NO_CONTENT)
}
