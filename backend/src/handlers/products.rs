//! HTTP handlers for product search and reconciliation

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::sources::ProductSummary;
use shared::ProductCode;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::products::{ProductService, ReconciliationResponse, SearchQuery};
use crate::AppState;

/// Search the catalog within the caller's stores
pub async fn search_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<ProductSummary>>> {
    let service = ProductService::new(state.snapshots);
    let products = service.search(&current_user.0, query)?;
    Ok(Json(products))
}

/// Suggested quantities, activation and central stock for one product
pub async fn get_reconciliation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_code): Path<ProductCode>,
) -> AppResult<Json<ReconciliationResponse>> {
    let service = ProductService::new(state.snapshots);
    let reconciliation = service.reconciliation(&current_user.0, product_code)?;
    Ok(Json(reconciliation))
}
