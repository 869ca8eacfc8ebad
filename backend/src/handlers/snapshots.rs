//! HTTP handler for snapshot load status

use axum::{extract::State, Json};

use crate::middleware::CurrentUser;
use crate::snapshots::SnapshotStatus;
use crate::AppState;

/// Load report and error, if any, for each snapshot source
pub async fn snapshot_status(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> Json<SnapshotStatus> {
    Json(state.snapshots.status())
}
