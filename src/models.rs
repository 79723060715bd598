//! Data models for the telemetry ingestion pipeline.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ---

/// Format a timestamp the way it travels on the wire: RFC 3339 with
/// millisecond precision and a trailing `Z`.
pub fn iso_millis(ts: &DateTime<Utc>) -> String {
    // ---
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Raw ingest payload as submitted by a device or gateway.
///
/// Field names follow the wire convention (camelCase); unknown fields are
/// rejected so that typos surface as validation errors instead of being
/// silently dropped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReadingInput {
    // ---
    pub device_id: String,
    pub site_id: String,
    /// ISO-8601 timestamp string, validated on ingest.
    pub ts: String,
    pub metrics: MetricsInput,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsInput {
    // ---
    pub temperature: f64,
    pub humidity: f64,
}

/// A reading that passed input validation and is ready to persist.
#[derive(Debug, Clone)]
pub struct ValidReading {
    // ---
    pub device_id: String,
    pub site_id: String,
    pub ts: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
}

impl ReadingInput {
    /// Validate the raw payload into a [`ValidReading`].
    ///
    /// Rejects empty identifiers and timestamps that do not parse as
    /// RFC 3339. Runs before any store or cache access, so a bad payload
    /// never leaves side effects.
    pub fn validate(self) -> Result<ValidReading, ApiError> {
        // ---
        if self.device_id.trim().is_empty() {
            return Err(ApiError::Validation("deviceId must be a non-empty string".into()));
        }
        if self.site_id.trim().is_empty() {
            return Err(ApiError::Validation("siteId must be a non-empty string".into()));
        }
        let ts = DateTime::parse_from_rfc3339(&self.ts)
            .map_err(|_| ApiError::Validation(format!("ts must be a valid ISO timestamp, got '{}'", self.ts)))?
            .with_timezone(&Utc);

        Ok(ValidReading {
            device_id: self.device_id,
            site_id: self.site_id,
            ts,
            temperature: self.metrics.temperature,
            humidity: self.metrics.humidity,
        })
    }
}

/// A persisted telemetry reading as stored in the `telemetry` table.
///
/// Rows are immutable once written; there is no update or delete path
/// anywhere in the service.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: Uuid,
    pub device_id: String,
    pub site_id: String,
    pub ts: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reading {
    /// Project the stored row into its public wire/cache representation.
    pub fn to_public(&self) -> PublicReading {
        // ---
        PublicReading {
            id: self.id.to_string(),
            device_id: self.device_id.clone(),
            site_id: self.site_id.clone(),
            ts: iso_millis(&self.ts),
            metrics: Metrics {
                temperature: self.temperature,
                humidity: self.humidity,
            },
            created_at: Some(iso_millis(&self.created_at)),
            updated_at: Some(iso_millis(&self.updated_at)),
        }
    }
}

/// Public projection of a reading: what API responses return and what the
/// latest-reading cache stores. Timestamps and identifiers are normalized
/// to strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicReading {
    // ---
    pub id: String,
    pub device_id: String,
    pub site_id: String,
    /// ISO-8601 string; parsed back to a timestamp for cache comparisons.
    pub ts: String,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    // ---
    pub temperature: f64,
    pub humidity: f64,
}

/// Windowed per-site statistics, computed on demand from the store.
///
/// The four float fields are `null` (not zero) when the window holds no
/// readings; "no data" must stay distinguishable from "data averaging to
/// zero".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSummary {
    // ---
    pub count: i64,
    pub avg_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub max_humidity: Option<f64>,
    pub unique_devices: i64,
}
