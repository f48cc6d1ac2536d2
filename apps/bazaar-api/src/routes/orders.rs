//! Customer order history, cancellation and return requests.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use bazaar_core::{Order, ReturnRequest, ReturnScope};
use bazaar_orders::SettledOrder;

use super::Customer;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

/// Omit `line_id` to return every remaining line.
#[derive(Debug, Deserialize)]
pub struct ReturnRequestBody {
    #[serde(default)]
    pub line_id: Option<String>,
    pub reason: String,
}

pub async fn list_orders(State(state): State<AppState>, customer: Customer) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.services.orders.list_for_user(customer.id()).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    customer: Customer,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.services.orders.get_for_user(customer.id(), &order_id).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    customer: Customer,
    Path(order_id): Path<String>,
    Json(body): Json<ReasonRequest>,
) -> Result<Json<SettledOrder>, ApiError> {
    let settled = state
        .services
        .orders
        .cancel_order(customer.id(), &order_id, &body.reason)
        .await?;
    Ok(Json(settled))
}

pub async fn cancel_line(
    State(state): State<AppState>,
    customer: Customer,
    Path((order_id, line_id)): Path<(String, String)>,
    Json(body): Json<ReasonRequest>,
) -> Result<Json<SettledOrder>, ApiError> {
    let settled = state
        .services
        .orders
        .cancel_line(customer.id(), &order_id, &line_id, &body.reason)
        .await?;
    Ok(Json(settled))
}

pub async fn request_return(
    State(state): State<AppState>,
    customer: Customer,
    Path(order_id): Path<String>,
    Json(body): Json<ReturnRequestBody>,
) -> Result<(StatusCode, Json<ReturnRequest>), ApiError> {
    let scope = match body.line_id {
        Some(line_id) => ReturnScope::Line(line_id),
        None => ReturnScope::WholeOrder,
    };
    let request = state
        .services
        .returns
        .request_return(customer.id(), &order_id, &scope, &body.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_returns(
    State(state): State<AppState>,
    customer: Customer,
) -> Result<Json<Vec<ReturnRequest>>, ApiError> {
    Ok(Json(state.services.returns.list_for_user(customer.id()).await?))
}
