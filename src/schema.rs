//! Database schema management for `sensorgrid-ingest`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `telemetry` table plus the indexes behind the two query
/// paths: latest-per-device point lookups and windowed per-site
/// aggregation. Safe to call on every startup; no-op if objects already
/// exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Readings are append-only; no update or delete path exists.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS telemetry (
            id          UUID PRIMARY KEY,
            device_id   TEXT        NOT NULL,
            site_id     TEXT        NOT NULL,
            ts          TIMESTAMPTZ NOT NULL,
            temperature DOUBLE PRECISION NOT NULL,
            humidity    DOUBLE PRECISION NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Serves `ORDER BY ts DESC LIMIT 1` per device
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_telemetry_device_ts
            ON telemetry (device_id, ts DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Serves the `[from, to)` site summary window
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_telemetry_site_ts
            ON telemetry (site_id, ts);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
