//! Thin client over the Redis key-value cache.
//!
//! All values are stored as JSON strings. The service keeps two key
//! namespaces here:
//! - `latest:<deviceId>` - most recent public reading per device (24h TTL)
//! - `alert:<deviceId>:<REASON>` - alert dedup claims (60s TTL)
//!
//! The atomic `SET NX EX` claim below is the only mutual-exclusion
//! primitive in the whole service; the application takes no locks of
//! its own.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum CacheError {
    // ---
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache payload was not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Shared handle to the cache. Cheap to clone; the underlying connection
/// manager multiplexes and reconnects on its own.
#[derive(Clone)]
pub struct CacheClient {
    // ---
    conn: ConnectionManager,
}

impl CacheClient {
    /// Open a connection to the cache at `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        // ---
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Fetch a JSON value. `Ok(None)` means the key is absent or expired,
    /// which is never an error in this service, only a fallback trigger.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        // ---
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Store a JSON value with a TTL in seconds.
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> Result<(), CacheError> {
        // ---
        let payload = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, payload, ttl_seconds).await?;
        Ok(())
    }

    /// Atomically create `key` with a TTL only if it does not already exist
    /// (`SET key 1 EX ttl NX`).
    ///
    /// Returns `true` if the claim was newly created and `false` if a live
    /// claim already held the key. A transport error leaves the question
    /// unanswered; callers decide how to treat that ambiguity.
    pub async fn claim(&self, key: &str, ttl_seconds: u64) -> Result<bool, CacheError> {
        // ---
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("EX")
            .arg(ttl_seconds)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    /// Liveness probe. Returns the raw server reply so the health check can
    /// distinguish "up" from "responding strangely".
    pub async fn ping(&self) -> Result<String, CacheError> {
        // ---
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(reply)
    }
}
