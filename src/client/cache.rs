use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::Clock;

#[derive(Debug, Clone)]
struct Entry {
    data: Value,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
    /// Loads that failed and were answered from an expired entry.
    pub stale_served: u64,
}

/// In-memory TTL cache for server responses.
///
/// A failed reload falls back to the last value stored under the key, however
/// old, so a flaky connection degrades to stale data instead of an error.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, Entry>>,
    stats: RwLock<CacheStats>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
            ttl,
            clock,
        }
    }

    /// Fresh cached value for `key`, or the result of `loader`.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, force_refresh: bool, loader: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: std::fmt::Display,
    {
        if !force_refresh {
            if let Some(data) = self.fresh(key).await {
                self.stats.write().await.hits += 1;
                debug!(key, "cache hit");
                return Ok(data);
            }
        }
        self.stats.write().await.misses += 1;

        match loader().await {
            Ok(fresh) => {
                self.set(key, fresh.clone()).await;
                Ok(fresh)
            }
            Err(e) => {
                let stale = self.entries.read().await.get(key).map(|entry| entry.data.clone());
                match stale {
                    Some(data) => {
                        warn!(key, error = %e, "load failed, serving stale data");
                        self.stats.write().await.stale_served += 1;
                        Ok(data)
                    }
                    None => Err(e),
                }
            }
        }
    }

    pub async fn set(&self, key: &str, data: Value) {
        let entry = Entry {
            data,
            stored_at: self.clock.utc(),
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Drops `key` and every key scoped under it (`key:...`).
    pub async fn invalidate(&self, key: &str) {
        let scoped = format!("{}:", key);
        self.entries
            .write()
            .await
            .retain(|k, _| k != key && !k.starts_with(&scoped));
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let keys = self.entries.read().await.len();
        CacheStats {
            keys,
            ..*self.stats.read().await
        }
    }

    async fn fresh(&self, key: &str) -> Option<Value> {
        let now = self.clock.utc();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| now - entry.stored_at < self.ttl)
            .map(|entry| entry.data.clone())
    }
}
