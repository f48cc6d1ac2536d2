//! Wallet and address book.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use bazaar_core::{Address, WalletSummary};
use bazaar_orders::NewAddress;

use super::Customer;
use crate::error::ApiError;
use crate::AppState;

pub async fn wallet(State(state): State<AppState>, customer: Customer) -> Result<Json<WalletSummary>, ApiError> {
    Ok(Json(state.services.wallet.summary(customer.id()).await?))
}

pub async fn list_addresses(
    State(state): State<AppState>,
    customer: Customer,
) -> Result<Json<Vec<Address>>, ApiError> {
    Ok(Json(state.services.addresses.list(customer.id()).await?))
}

pub async fn add_address(
    State(state): State<AppState>,
    customer: Customer,
    Json(input): Json<NewAddress>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    let address = state.services.addresses.add(customer.id(), input).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

pub async fn delete_address(
    State(state): State<AppState>,
    customer: Customer,
    Path(address_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.services.addresses.delete(customer.id(), &address_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
