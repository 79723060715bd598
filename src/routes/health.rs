// src/routes/health.rs
//! API health check endpoint for the sensorgrid backend.
//!
//! This module defines the `/health` route used by container orchestrators
//! (e.g., Docker, Kubernetes) and CI pipelines to verify that the service
//! and its collaborators are reachable. It is a sibling module in the
//! `routes` directory and follows the Explicit Module Boundary Pattern (EMBP):
//! - Internal to this file: endpoint handler(s), component probes, and types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route
//!
//! Unlike a liveness ping, this endpoint probes the store and the cache
//! independently (each bounded to 2s) and reports per-component status.
//! Probe failures are data in the report, never HTTP failures; the route
//! always answers 200.

use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::time::timeout;

use super::AppState;
use crate::models::iso_millis;
use crate::{CacheClient, TelemetryStore};

// ---

const COMPONENT_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ComponentState {
    // ---
    Up,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum OverallState {
    // ---
    Ok,
    Degraded,
    Down,
}

#[derive(Debug, Serialize)]
struct ComponentHealth {
    // ---
    status: ComponentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ComponentHealth {
    fn up() -> Self {
        // ---
        Self { status: ComponentState::Up, details: None }
    }

    fn degraded(details: String) -> Self {
        // ---
        Self { status: ComponentState::Degraded, details: Some(details) }
    }

    fn down(details: String) -> Self {
        // ---
        Self { status: ComponentState::Down, details: Some(details) }
    }
}

/// JSON response body for the `/health` endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    // ---
    status: OverallState,
    store: ComponentHealth,
    cache: ComponentHealth,
    uptime_sec: u64,
    timestamp: String,
    version: &'static str,
}

/// Worst-of rollup: any `down` component takes the whole report down, any
/// `degraded` one degrades it, otherwise `ok`.
fn rollup(components: &[ComponentState]) -> OverallState {
    // ---
    if components.iter().any(|s| *s == ComponentState::Down) {
        OverallState::Down
    } else if components.iter().any(|s| *s == ComponentState::Degraded) {
        OverallState::Degraded
    } else {
        OverallState::Ok
    }
}

async fn check_store(store: &TelemetryStore) -> ComponentHealth {
    // ---
    match timeout(COMPONENT_TIMEOUT, store.ping()).await {
        Ok(Ok(())) => ComponentHealth::up(),
        Ok(Err(e)) => ComponentHealth::down(e.to_string()),
        Err(_) => ComponentHealth::down(format!(
            "timeout after {}ms",
            COMPONENT_TIMEOUT.as_millis()
        )),
    }
}

async fn check_cache(cache: &CacheClient) -> ComponentHealth {
    // ---
    match timeout(COMPONENT_TIMEOUT, cache.ping()).await {
        Ok(Ok(reply)) if reply.eq_ignore_ascii_case("PONG") => ComponentHealth::up(),
        Ok(Ok(reply)) => ComponentHealth::degraded(format!("unexpected reply: {reply}")),
        Ok(Err(e)) => ComponentHealth::down(e.to_string()),
        Err(_) => ComponentHealth::down(format!(
            "timeout after {}ms",
            COMPONENT_TIMEOUT.as_millis()
        )),
    }
}

/// Handle `GET /health`.
///
/// Probes both collaborators concurrently and folds their states into the
/// aggregate status.
async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    // ---
    let (store, cache) = tokio::join!(check_store(&state.store), check_cache(&state.cache));

    let status = rollup(&[store.status, cache.status]);

    Json(HealthReport {
        status,
        store,
        cache,
        uptime_sec: state.started.elapsed().as_secs(),
        timestamp: iso_millis(&Utc::now()),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_rollup_all_up_is_ok() {
        // ---
        assert_eq!(
            rollup(&[ComponentState::Up, ComponentState::Up]),
            OverallState::Ok
        );
    }

    #[test]
    fn test_rollup_any_degraded_degrades() {
        // ---
        assert_eq!(
            rollup(&[ComponentState::Up, ComponentState::Degraded]),
            OverallState::Degraded
        );
    }

    #[test]
    fn test_rollup_down_beats_degraded() {
        // ---
        assert_eq!(
            rollup(&[ComponentState::Degraded, ComponentState::Down]),
            OverallState::Down
        );
        assert_eq!(
            rollup(&[ComponentState::Down, ComponentState::Up]),
            OverallState::Down
        );
    }

    #[test]
    fn test_report_wire_shape() {
        // ---
        let report = HealthReport {
            status: OverallState::Degraded,
            store: ComponentHealth::up(),
            cache: ComponentHealth::degraded("unexpected reply: HELLO".into()),
            uptime_sec: 42,
            timestamp: "2025-09-01T10:00:00.000Z".into(),
            version: "0.1.0",
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["store"]["status"], "up");
        assert!(json["store"].get("details").is_none());
        assert_eq!(json["cache"]["status"], "degraded");
        assert_eq!(json["cache"]["details"], "unexpected reply: HELLO");
        assert_eq!(json["uptimeSec"], 42);
    }
}
