//! Redis-backed result cache keyed by request fingerprint.
//!
//! Cache failures are never fatal: a backend error reads as a miss and the
//! caller proceeds uncached. Values are the UTF-8 JSON encoding of
//! [`ScrapeData`]; keys are `scrape:<hex-fingerprint>`.

pub mod fingerprint;

pub use fingerprint::{cache_key, fingerprint};

use crate::scrape::types::ScrapeData;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared handle to the result cache. Cheap to construct; the connection is
/// established lazily on first use and reused afterwards.
#[derive(Debug)]
pub struct ResultCache {
    client: Option<redis::Client>,
    conn: Mutex<Option<MultiplexedConnection>>,
    default_ttl_secs: u64,
}

impl ResultCache {
    /// Build a cache over the given backend URI. An unparseable URI degrades
    /// to the disabled cache rather than failing startup.
    #[must_use]
    pub fn new(redis_url: &str, default_ttl_secs: u64) -> Self {
        let client = match redis::Client::open(redis_url) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Invalid cache URI {redis_url:?}, caching disabled: {e}");
                None
            }
        };
        Self {
            client,
            conn: Mutex::new(None),
            default_ttl_secs,
        }
    }

    /// A cache that never hits and never stores.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            client: None,
            conn: Mutex::new(None),
            default_ttl_secs: 0,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    #[must_use]
    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Look up a prior result. Any backend or decode error is a miss.
    pub async fn get(&self, fp: &str) -> Option<ScrapeData> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = match conn.get(cache_key(fp)).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache read failed, treating as miss: {e}");
                self.drop_connection().await;
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(data) => {
                debug!("Cache hit for fingerprint {fp}");
                Some(data)
            }
            Err(e) => {
                warn!("Cache entry for {fp} failed to decode, treating as miss: {e}");
                None
            }
        }
    }

    /// Store a result with the given TTL (seconds), or the default when
    /// `ttl_secs` is None. Write failures are logged, never propagated.
    pub async fn put(&self, fp: &str, data: &ScrapeData, ttl_secs: Option<u64>) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let payload = match serde_json::to_string(data) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode result for caching: {e}");
                return;
            }
        };
        let ttl = ttl_secs.unwrap_or(self.default_ttl_secs).max(1);
        if let Err(e) = conn.set_ex::<_, _, ()>(cache_key(fp), payload, ttl).await {
            warn!("Cache write failed for {fp}: {e}");
            self.drop_connection().await;
        }
    }

    /// Remove an entry. Only called on explicit request.
    pub async fn invalidate(&self, fp: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        if let Err(e) = conn.del::<_, ()>(cache_key(fp)).await {
            warn!("Cache invalidation failed for {fp}: {e}");
            self.drop_connection().await;
        }
    }

    /// Get the shared connection, dialing on first use.
    async fn connection(&self) -> Option<MultiplexedConnection> {
        let client = self.client.as_ref()?;
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Some(conn.clone());
        }
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => {
                *slot = Some(conn.clone());
                Some(conn)
            }
            Err(e) => {
                warn!("Cache backend unreachable: {e}");
                None
            }
        }
    }

    /// Forget a connection after an I/O error so the next call re-dials.
    async fn drop_connection(&self) {
        *self.conn.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::types::ScrapeOptions;

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = ResultCache::disabled();
        let fp = fingerprint("https://x.test/a", &ScrapeOptions::default());
        assert!(!cache.is_enabled());
        assert!(cache.get(&fp).await.is_none());
        // put/invalidate are no-ops, not errors
        cache.put(&fp, &ScrapeData::default(), None).await;
        cache.invalidate(&fp).await;
    }

    #[tokio::test]
    async fn unreachable_backend_reads_as_miss() {
        // Port 1 is never a redis server; connect fails and the cache
        // degrades instead of erroring.
        let cache = ResultCache::new("redis://127.0.0.1:1", 60);
        assert!(cache.is_enabled());
        let fp = fingerprint("https://x.test/a", &ScrapeOptions::default());
        assert!(cache.get(&fp).await.is_none());
        cache.put(&fp, &ScrapeData::default(), Some(5)).await;
    }
}
