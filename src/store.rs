//! Durable store access for telemetry readings.
//!
//! Wraps the Postgres pool behind the handful of operations the service
//! needs: single insert, ordered batch insert, latest-per-device point
//! lookup, and the windowed per-site aggregation. Query semantics beyond
//! that stay inside the database.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Reading, SiteSummary, ValidReading};

// ---

const RETURNING_COLUMNS: &str =
    "id, device_id, site_id, ts, temperature, humidity, created_at, updated_at";

/// Shared handle to the durable store. Clones share the same pool.
#[derive(Clone)]
pub struct TelemetryStore {
    // ---
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    // ---
    count: i64,
    avg_temperature: Option<f64>,
    max_temperature: Option<f64>,
    avg_humidity: Option<f64>,
    max_humidity: Option<f64>,
    unique_devices: i64,
}

impl TelemetryStore {
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }

    /// Persist a single reading and return the stored row.
    pub async fn insert_one(&self, reading: &ValidReading) -> Result<Reading, sqlx::Error> {
        // ---
        let sql = format!(
            "INSERT INTO telemetry (id, device_id, site_id, ts, temperature, humidity) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RETURNING_COLUMNS}"
        );
        sqlx::query_as::<_, Reading>(&sql)
            .bind(Uuid::new_v4())
            .bind(&reading.device_id)
            .bind(&reading.site_id)
            .bind(reading.ts)
            .bind(reading.temperature)
            .bind(reading.humidity)
            .fetch_one(&self.pool)
            .await
    }

    /// Persist an ordered batch inside one transaction.
    ///
    /// Any failed insert rolls the whole batch back, so callers never see a
    /// partially committed batch and never run cache or alert side effects
    /// for one.
    pub async fn insert_many(&self, readings: &[ValidReading]) -> Result<Vec<Reading>, sqlx::Error> {
        // ---
        let sql = format!(
            "INSERT INTO telemetry (id, device_id, site_id, ts, temperature, humidity) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RETURNING_COLUMNS}"
        );

        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(readings.len());
        for reading in readings {
            let row = sqlx::query_as::<_, Reading>(&sql)
                .bind(Uuid::new_v4())
                .bind(&reading.device_id)
                .bind(&reading.site_id)
                .bind(reading.ts)
                .bind(reading.temperature)
                .bind(reading.humidity)
                .fetch_one(&mut *tx)
                .await?;
            rows.push(row);
        }
        tx.commit().await?;

        Ok(rows)
    }

    /// Point lookup: the single most recent reading for a device, if any.
    pub async fn latest_for_device(&self, device_id: &str) -> Result<Option<Reading>, sqlx::Error> {
        // ---
        let sql = format!(
            "SELECT {RETURNING_COLUMNS} FROM telemetry \
             WHERE device_id = $1 ORDER BY ts DESC LIMIT 1"
        );
        sqlx::query_as::<_, Reading>(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Windowed aggregation over `[from, to)` for one site.
    ///
    /// `AVG`/`MAX` over zero rows yield SQL NULLs, which map straight onto
    /// the nullable summary fields; no application-side special-casing.
    pub async fn site_summary(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SiteSummary, sqlx::Error> {
        // ---
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                COUNT(*)                 AS count,
                AVG(temperature)         AS avg_temperature,
                MAX(temperature)         AS max_temperature,
                AVG(humidity)            AS avg_humidity,
                MAX(humidity)            AS max_humidity,
                COUNT(DISTINCT device_id) AS unique_devices
            FROM telemetry
            WHERE site_id = $1 AND ts >= $2 AND ts < $3
            "#,
        )
        .bind(site_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(SiteSummary {
            count: row.count,
            avg_temperature: row.avg_temperature,
            max_temperature: row.max_temperature,
            avg_humidity: row.avg_humidity,
            max_humidity: row.max_humidity,
            unique_devices: row.unique_devices,
        })
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        // ---
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
