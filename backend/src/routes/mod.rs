//! Route definitions for the replenishment server

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - snapshot status
        .nest("/snapshots", snapshot_routes(state))
        // Protected routes - catalog and reconciliation
        .nest("/products", product_routes(state))
        // Protected routes - order capture, listing and approval
        .nest("/orders", order_routes(state))
}

/// Snapshot routes (protected)
fn snapshot_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::snapshot_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Product routes (protected)
fn product_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/search", get(handlers::search_products))
        .route("/:product_code/reconciliation", get(handlers::get_reconciliation))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Order routes (protected)
fn order_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::submit_orders))
        .route("/recent", get(handlers::recent_orders))
        .route("/review", get(handlers::review_orders))
        .route("/approve", post(handlers::approve_orders))
        .route("/reject", post(handlers::reject_orders))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
