//! Telemetry ingestion endpoint.
//!
//! `POST /v1/telemetry` accepts either one reading object or a non-empty
//! array of them. The orchestration validates everything up front,
//! persist (the durability boundary), then fan out the cache update and
//! alert evaluation concurrently. Cache and alert outcomes never reach the
//! HTTP response; once the store write commits, the request has succeeded.

use std::collections::HashMap;

use axum::{
    extract::State, response::IntoResponse, response::Response, routing::post, Json, Router,
};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::AppState;
use crate::error::ApiError;
use crate::latest;
use crate::models::{Metrics, PublicReading, Reading, ReadingInput, ValidReading};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/v1/telemetry", post(ingest))
}

/// Single-item response: the pared-down public fields, without the audit
/// timestamps.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestOneResponse {
    // ---
    id: String,
    device_id: String,
    site_id: String,
    ts: String,
    metrics: Metrics,
}

impl From<PublicReading> for IngestOneResponse {
    fn from(p: PublicReading) -> Self {
        // ---
        Self {
            id: p.id,
            device_id: p.device_id,
            site_id: p.site_id,
            ts: p.ts,
            metrics: p.metrics,
        }
    }
}

#[derive(Debug, Serialize)]
struct IngestManyResponse {
    // ---
    inserted: usize,
    docs: Vec<PublicReading>,
}

/// Handle `POST /v1/telemetry`.
///
/// The body is taken as raw JSON and dispatched on shape: an array goes
/// through the batch path, anything else through the single path. An empty
/// array is rejected before any side effect.
async fn ingest(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Response, ApiError> {
    // ---
    if let Value::Array(items) = body {
        if items.is_empty() {
            return Err(ApiError::Validation("array payload cannot be empty".into()));
        }

        let mut validated = Vec::with_capacity(items.len());
        for item in items {
            let input: ReadingInput = serde_json::from_value(item)
                .map_err(|e| ApiError::Validation(e.to_string()))?;
            validated.push(input.validate()?);
        }

        let response = save_many(&state, validated).await?;
        return Ok(Json(response).into_response());
    }

    let input: ReadingInput =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;
    let response = save_one(&state, input.validate()?).await?;
    Ok(Json(response).into_response())
}

/// Persist one reading, then run the cache update and alert evaluation
/// concurrently. Both settle before the response is built, but only the
/// store write's outcome decides it.
async fn save_one(state: &AppState, reading: ValidReading) -> Result<IngestOneResponse, ApiError> {
    // ---
    let row = state.store.insert_one(&reading).await?;
    debug!("persisted reading {} for device {}", row.id, row.device_id);

    tokio::join!(
        latest::upsert_latest_if_newer(&state.cache, &row),
        state.alerts.maybe_send_for(&row),
    );

    Ok(IngestOneResponse::from(row.to_public()))
}

/// Persist the whole batch transactionally, then update the cache once per
/// device (with that device's newest row) and evaluate alerts for every
/// row. A partial insert failure aborts everything with no side effects.
async fn save_many(
    state: &AppState,
    readings: Vec<ValidReading>,
) -> Result<IngestManyResponse, ApiError> {
    // ---
    let rows = state.store.insert_many(&readings).await?;
    info!("persisted batch of {} readings", rows.len());

    let cache_updates = join_all(
        newest_per_device(&rows)
            .into_iter()
            .map(|row| latest::upsert_latest_if_newer(&state.cache, row)),
    );
    // Every row is alert-eligible, not just each device's newest.
    let alert_runs = join_all(rows.iter().map(|row| state.alerts.maybe_send_for(row)));
    tokio::join!(cache_updates, alert_runs);

    Ok(IngestManyResponse {
        inserted: rows.len(),
        docs: rows.iter().map(Reading::to_public).collect(),
    })
}

/// Reduce a batch to the maximum-`ts` row per device, so each device gets
/// exactly one compare-and-write against the cache.
fn newest_per_device(rows: &[Reading]) -> Vec<&Reading> {
    // ---
    let mut by_device: HashMap<&str, &Reading> = HashMap::new();
    for row in rows {
        by_device
            .entry(row.device_id.as_str())
            .and_modify(|current| {
                if row.ts > current.ts {
                    *current = row;
                }
            })
            .or_insert(row);
    }
    by_device.into_values().collect()
}
