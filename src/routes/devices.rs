//! Latest-reading lookup per device.
//!
//! `GET /v1/devices/{deviceId}/latest` serves the read side of the
//! cache-aside protocol: cache hit answers directly, a miss falls back to
//! the store and backfills. A device with no readings at all is a 404.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use super::AppState;
use crate::error::ApiError;
use crate::latest;
use crate::models::PublicReading;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/v1/devices/{device_id}/latest", get(handler))
}

async fn handler(
    Path(device_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PublicReading>, ApiError> {
    // ---
    let reading = latest::get_latest(&state.store, &state.cache, &device_id).await?;
    Ok(Json(reading))
}
