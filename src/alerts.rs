//! Threshold alerts with per-reason, time-windowed deduplication.
//!
//! Every persisted reading is evaluated against the threshold rules; each
//! breaching rule becomes an independent delivery candidate. A candidate is
//! only delivered after winning an atomic `SET NX EX` dedup claim
//! (`alert:<deviceId>:<REASON>`, 60s TTL), so a device+reason pair fires at
//! most once per window regardless of how many processes race.
//!
//! The claim is consumed before delivery and never released: a failed
//! webhook call burns the window for that pair. At-most-one attempt cycle
//! per window is the contract, not guaranteed notification.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::CacheClient;
use crate::models::{iso_millis, Reading};

// ---

const HIGH_TEMPERATURE_THRESHOLD: f64 = 50.0;
const HIGH_HUMIDITY_THRESHOLD: f64 = 90.0;
const DEDUP_TTL_SECONDS: u64 = 60;
const WEBHOOK_TIMEOUT: Duration = Duration::from_millis(3000);

/// Closed set of alert reasons. Keeping this a tagged enum (not free-form
/// strings) ties the rule evaluator and the claim/delivery key space to the
/// same names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertReason {
    // ---
    HighTemperature,
    HighHumidity,
}

impl AlertReason {
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AlertReason::HighTemperature => "HIGH_TEMPERATURE",
            AlertReason::HighHumidity => "HIGH_HUMIDITY",
        }
    }
}

fn claim_key(device_id: &str, reason: AlertReason) -> String {
    // ---
    format!("alert:{}:{}", device_id, reason.as_str())
}

/// Outbound webhook body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertPayload<'a> {
    // ---
    device_id: &'a str,
    site_id: &'a str,
    ts: &'a str,
    reason: AlertReason,
    value: f64,
}

/// Evaluate the threshold rules for one reading. Zero, one, or two
/// candidates; both rules may breach simultaneously.
fn evaluate(temperature: f64, humidity: f64) -> Vec<(AlertReason, f64)> {
    // ---
    let mut candidates = Vec::new();
    if temperature > HIGH_TEMPERATURE_THRESHOLD {
        candidates.push((AlertReason::HighTemperature, temperature));
    }
    if humidity > HIGH_HUMIDITY_THRESHOLD {
        candidates.push((AlertReason::HighHumidity, humidity));
    }
    candidates
}

/// Evaluates rules, deduplicates, and delivers webhook notifications.
///
/// With no webhook URL configured the engine is inert: no evaluation, no
/// claims, no network calls.
#[derive(Clone)]
pub struct AlertEngine {
    // ---
    webhook_url: Option<String>,
    http: reqwest::Client,
    cache: CacheClient,
}

impl AlertEngine {
    pub fn new(webhook_url: Option<String>, cache: CacheClient) -> Self {
        // ---
        if webhook_url.is_none() {
            warn!("ALERT_WEBHOOK_URL is empty, alerts are disabled");
        }
        Self {
            webhook_url,
            http: reqwest::Client::new(),
            cache,
        }
    }

    /// Fire any alerts this reading warrants. Never returns an error to the
    /// ingestion path: delivery outcomes are logged, not propagated.
    ///
    /// Candidates run concurrently and independently; all are awaited
    /// before returning, but one candidate failing or crawling does not
    /// block or fail the others.
    pub async fn maybe_send_for(&self, reading: &Reading) {
        // ---
        let Some(url) = self.webhook_url.as_deref() else {
            return;
        };

        let candidates = evaluate(reading.temperature, reading.humidity);
        if candidates.is_empty() {
            return;
        }

        let ts = iso_millis(&reading.ts);
        join_all(candidates.into_iter().map(|(reason, value)| {
            self.dispatch(
                url,
                AlertPayload {
                    device_id: &reading.device_id,
                    site_id: &reading.site_id,
                    ts: &ts,
                    reason,
                    value,
                },
            )
        }))
        .await;
    }

    async fn dispatch(&self, url: &str, payload: AlertPayload<'_>) {
        // ---
        let key = claim_key(payload.device_id, payload.reason);
        match self.cache.claim(&key, DEDUP_TTL_SECONDS).await {
            Ok(true) => {}
            Ok(false) => {
                // duplicate within the window, skip silently
                debug!("alert suppressed by live claim {}", key);
                return;
            }
            Err(e) => {
                // Can't tell whether a claim exists; not sending is the
                // conservative read of that ambiguity.
                warn!("dedup claim failed for {}, not sending: {}", key, e);
                return;
            }
        }

        if let Err(first) = self.post_once(url, &payload).await {
            warn!(
                "webhook failed once, retrying... reason={} device={}: {}",
                payload.reason.as_str(),
                payload.device_id,
                first
            );
            if let Err(e) = self.post_once(url, &payload).await {
                error!(
                    "failed to send alert: {} device={}: {}",
                    payload.reason.as_str(),
                    payload.device_id,
                    e
                );
                return;
            }
        }

        info!(
            "alert sent: {} device={} value={}",
            payload.reason.as_str(),
            payload.device_id,
            payload.value
        );
    }

    async fn post_once(&self, url: &str, payload: &AlertPayload<'_>) -> reqwest::Result<()> {
        // ---
        self.http
            .post(url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
