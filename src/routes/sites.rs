//! Windowed per-site aggregation.
//!
//! `GET /v1/sites/{siteId}/summary?from=...&to=...` computes statistics
//! over the half-open window `[from, to)` straight from the store. This
//! path deliberately bypasses the cache: windowed queries are not
//! cache-friendly the way point lookups are.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;
use crate::models::SiteSummary;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/v1/sites/{site_id}/summary", get(handler))
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    // ---
    from: String,
    to: String,
}

async fn handler(
    Path(site_id): Path<String>,
    Query(params): Query<SummaryQuery>,
    State(state): State<AppState>,
) -> Result<Json<SiteSummary>, ApiError> {
    // ---
    let (from, to) = parse_window(&params.from, &params.to)?;
    let summary = state.store.site_summary(&site_id, from, to).await?;
    Ok(Json(summary))
}

/// Validate the window bounds: both must parse as ISO timestamps and the
/// interval must be non-empty (`from < to`).
fn parse_window(from: &str, to: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    // ---
    let parse = |value: &str| {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ApiError::Validation("from/to must be valid ISO timestamps".into()))
    };
    let from = parse(from)?;
    let to = parse(to)?;

    if from >= to {
        return Err(ApiError::Validation("from must be earlier than to".into()));
    }
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_window_accepts_valid_bounds() {
        // ---
        let (from, to) =
            parse_window("2025-09-01T00:00:00Z", "2025-09-02T00:00:00Z").unwrap();
        assert!(from < to);
    }

    #[test]
    fn test_parse_window_rejects_bad_timestamps() {
        // ---
        assert!(parse_window("yesterday", "2025-09-02T00:00:00Z").is_err());
        assert!(parse_window("2025-09-01T00:00:00Z", "tomorrow").is_err());
    }

    #[test]
    fn test_parse_window_rejects_empty_interval() {
        // ---
        // equal bounds: the half-open window [from, to) would be empty
        assert!(parse_window("2025-09-01T00:00:00Z", "2025-09-01T00:00:00Z").is_err());
        assert!(parse_window("2025-09-02T00:00:00Z", "2025-09-01T00:00:00Z").is_err());
    }
}
