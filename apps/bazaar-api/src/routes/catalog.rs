//! Product listing with offer prices resolved.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use bazaar_orders::PricedProduct;

use crate::error::ApiError;
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<PricedProduct>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let products = state
        .services
        .catalog
        .list_products(query.category.as_deref(), limit)
        .await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<PricedProduct>, ApiError> {
    Ok(Json(state.services.catalog.priced_product(&product_id).await?))
}
