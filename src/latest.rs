//! Latest-reading cache protocol.
//!
//! Keeps one cache entry per device, `latest:<deviceId>`, holding the most
//! recent public reading with a 24h TTL. Reads go cache-first and fall back
//! to the store on a miss (then backfill); writes only overwrite the entry
//! when the incoming reading is strictly newer.
//!
//! The compare-then-write in [`upsert_latest_if_newer`] is not atomic
//! against the cache backend: two concurrent writers for one device can
//! race, and the loser's comparison goes stale. The entry still converges
//! to the true maximum once it expires and a read repopulates it from the
//! store, which is why every cache failure here degrades instead of
//! failing the request.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::CacheClient;
use crate::error::ApiError;
use crate::models::{PublicReading, Reading};
use crate::store::TelemetryStore;

// ---

pub const LATEST_TTL_SECONDS: u64 = 60 * 60 * 24;

pub fn latest_key(device_id: &str) -> String {
    // ---
    format!("latest:{device_id}")
}

/// Should `incoming` replace a cache entry carrying `cached_ts`?
///
/// True when there is no entry, when the stored timestamp does not parse
/// (a corrupt entry is treated as absent), or when the incoming timestamp
/// is strictly greater. Ties keep the existing entry.
fn is_newer(cached_ts: Option<&str>, incoming: DateTime<Utc>) -> bool {
    // ---
    match cached_ts.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok()) {
        Some(cached) => incoming > cached.with_timezone(&Utc),
        None => true,
    }
}

/// Serve the most recent reading for `device_id`.
///
/// Cache hit returns without touching the store. On a miss (or a cache
/// failure, which only costs us the shortcut) the store is queried for the
/// greatest-`ts` row; a found row backfills the cache before returning.
/// No row at all is a [`ApiError::NotFound`] and leaves no cache write.
pub async fn get_latest(
    store: &TelemetryStore,
    cache: &CacheClient,
    device_id: &str,
) -> Result<PublicReading, ApiError> {
    // ---
    let key = latest_key(device_id);

    match cache.get_json::<PublicReading>(&key).await {
        Ok(Some(cached)) => {
            debug!("cache hit for {}", key);
            return Ok(cached);
        }
        Ok(None) => {}
        Err(e) => warn!("cache read failed for {}, falling back to store: {}", key, e),
    }

    let row = store
        .latest_for_device(device_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no telemetry for device {device_id}")))?;

    let public = row.to_public();
    if let Err(e) = cache.set_json(&key, &public, LATEST_TTL_SECONDS).await {
        warn!("cache backfill failed for {}: {}", key, e);
    }

    Ok(public)
}

/// Write-through-if-newer: refresh the device's cache entry after a
/// successful persist, but only when the new reading's timestamp beats the
/// cached one.
///
/// Runs after the store write has already committed, so nothing here may
/// fail the request; every cache error is logged and swallowed. When the
/// comparison read itself fails the write is skipped rather than risking a
/// stale overwrite.
pub async fn upsert_latest_if_newer(cache: &CacheClient, reading: &Reading) {
    // ---
    let key = latest_key(&reading.device_id);

    let cached_ts = match cache.get_json::<PublicReading>(&key).await {
        Ok(entry) => entry.map(|e| e.ts),
        Err(e) => {
            warn!("cache read failed for {}, skipping latest update: {}", key, e);
            return;
        }
    };

    if !is_newer(cached_ts.as_deref(), reading.ts) {
        debug!("cached entry for {} is newer or equal, leaving it", key);
        return;
    }

    if let Err(e) = cache
        .set_json(&key, &reading.to_public(), LATEST_TTL_SECONDS)
        .await
    {
        warn!("cache write failed for {}: {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_latest_key_format() {
        // ---
        assert_eq!(latest_key("dev-001"), "latest:dev-001");
    }

    #[test]
    fn test_absent_entry_is_always_replaced() {
        // ---
        let incoming = Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap();
        assert!(is_newer(None, incoming));
    }

    #[test]
    fn test_newer_reading_replaces_older_entry() {
        // ---
        let incoming = Utc.with_ymd_and_hms(2025, 9, 1, 10, 1, 0).unwrap();
        assert!(is_newer(Some("2025-09-01T10:00:00.000Z"), incoming));
    }

    #[test]
    fn test_older_or_equal_reading_keeps_entry() {
        // ---
        let equal = Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap();
        assert!(!is_newer(Some("2025-09-01T10:00:00.000Z"), equal));

        let older = Utc.with_ymd_and_hms(2025, 9, 1, 9, 59, 59).unwrap();
        assert!(!is_newer(Some("2025-09-01T10:00:00.000Z"), older));
    }

    #[test]
    fn test_unparseable_cached_ts_is_treated_as_absent() {
        // ---
        let incoming = Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap();
        assert!(is_newer(Some("garbage"), incoming));
    }

    #[test]
    fn test_offset_timestamps_compare_in_utc() {
        // ---
        // 12:00+02:00 is 10:00Z; an incoming 10:00:01Z must win.
        let incoming = Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 1).unwrap();
        assert!(is_newer(Some("2025-09-01T12:00:00.000+02:00"), incoming));
    }
}
