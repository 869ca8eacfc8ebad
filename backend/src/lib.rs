//! Store replenishment backend
//!
//! Serves the order screen (product search and reconciliation against the
//! catalog, history and warehouse snapshots), captures order batches into the
//! consolidated ledger, and runs the approval workflow over it.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod snapshots;

pub use config::Config;

use ledger::OrderLedger;
use services::OfferSource;
use snapshots::SnapshotCache;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub snapshots: Arc<SnapshotCache>,
    pub ledger: Arc<dyn OrderLedger>,
    pub offers: Arc<dyn OfferSource>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Store Replenishment API v1"
}
