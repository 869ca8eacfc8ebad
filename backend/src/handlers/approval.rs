//! HTTP handlers for the approval workflow

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::approval::{
    ApprovalService, ApproveInput, DecisionResponse, RejectInput, ReviewLine, ReviewQuery,
};
use crate::AppState;

fn service(state: AppState) -> ApprovalService {
    ApprovalService::new(state.ledger, state.offers)
}

/// Lines awaiting (or past) approval, with current offers
pub async fn review_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReviewQuery>,
) -> AppResult<Json<Vec<ReviewLine>>> {
    let lines = service(state)
        .review(&current_user.0, query, Utc::now().date_naive())
        .await?;
    Ok(Json(lines))
}

/// Approve lines, optionally correcting quantities
pub async fn approve_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ApproveInput>,
) -> AppResult<Json<DecisionResponse>> {
    let affected = service(state)
        .approve(&current_user.0, input, Utc::now())
        .await?;
    Ok(Json(DecisionResponse { affected }))
}

/// Reject lines
pub async fn reject_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RejectInput>,
) -> AppResult<Json<DecisionResponse>> {
    let affected = service(state)
        .reject(&current_user.0, input, Utc::now())
        .await?;
    Ok(Json(DecisionResponse { affected }))
}
