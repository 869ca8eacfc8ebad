//! HTTP handlers for order submission and listing

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use shared::OrderLine;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::orders::{
    OrderListQuery, OrderService, SubmitOrdersInput, SubmitOrdersResponse,
};
use crate::AppState;

/// Submit a batch of order lines; all of them are saved or none
pub async fn submit_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SubmitOrdersInput>,
) -> AppResult<Json<SubmitOrdersResponse>> {
    let snapshots = state.snapshots.current()?;
    let service = OrderService::new(state.ledger);
    let lines_written = service
        .submit(&current_user.0, input, snapshots.set(), Utc::now())
        .await?;
    Ok(Json(SubmitOrdersResponse { lines_written }))
}

/// List ledger lines
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<Vec<OrderLine>>> {
    let service = OrderService::new(state.ledger);
    let lines = service.list(&current_user.0, query).await?;
    Ok(Json(lines))
}

/// The caller's recently submitted lines
pub async fn recent_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<OrderLine>>> {
    let service = OrderService::new(state.ledger);
    let lines = service
        .recent(&current_user.0, state.config.orders.recent_days, Utc::now())
        .await?;
    Ok(Json(lines))
}
