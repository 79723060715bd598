use std::time::Instant;

use axum::Router;

use crate::{AlertEngine, CacheClient, TelemetryStore};

mod devices;
mod health;
mod sites;
mod telemetry;

// ---

/// Shared handles owned by the route layer. Everything inside is a cheap
/// clone over a pooled or multiplexed connection.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub store: TelemetryStore,
    pub cache: CacheClient,
    pub alerts: AlertEngine,
    pub started: Instant,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(telemetry::router())
        .merge(devices::router())
        .merge(sites::router())
        .merge(health::router())
        .with_state(state)
}
