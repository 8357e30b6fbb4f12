use crate::error::{MeshError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Typed key/value store port (C3): `get`, `set` with TTL, atomic increments,
/// and a keyspace scan. Keys are byte strings, values are JSON-encoded —
/// callers serialize/deserialize their own types around this trait.
///
/// Every method here must degrade gracefully rather than panic: the Token
/// Tracker (§4.3) treats an unavailable KV as a no-op write / `{error}` read,
/// not a crash.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
    async fn incr(&self, key: &str, by: i64) -> Result<i64>;
    async fn incrbyfloat(&self, key: &str, by: f64) -> Result<f64>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
}

/// In-memory default adapter. Used in tests and as the zero-configuration
/// fallback when no KV URL is configured; state does not survive a process
/// restart, matching the "agents survive restart only if the KV restores
/// them" lifecycle note (§3).
#[derive(Default)]
pub struct InMemoryKv {
    values: Arc<RwLock<HashMap<String, (String, Option<std::time::Instant>)>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_expired(entry: &(String, Option<std::time::Instant>)) -> bool {
        matches!(entry.1, Some(deadline) if std::time::Instant::now() >= deadline)
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().await;
        match values.get(key) {
            Some(entry) if !Self::is_expired(entry) => Ok(Some(entry.0.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let deadline = ttl.map(|d| std::time::Instant::now() + d);
        self.values
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64) -> Result<i64> {
        let mut values = self.values.write().await;
        let current = match values.get(key) {
            Some(entry) if !Self::is_expired(entry) => entry.0.parse::<i64>().unwrap_or(0),
            _ => 0,
        };
        let updated = current + by;
        let ttl = values.get(key).and_then(|e| e.1);
        values.insert(key.to_string(), (updated.to_string(), ttl));
        Ok(updated)
    }

    async fn incrbyfloat(&self, key: &str, by: f64) -> Result<f64> {
        let mut values = self.values.write().await;
        let current = match values.get(key) {
            Some(entry) if !Self::is_expired(entry) => entry.0.parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        let updated = current + by;
        let ttl = values.get(key).and_then(|e| e.1);
        values.insert(key.to_string(), (updated.to_string(), ttl));
        Ok(updated)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let values = self.values.read().await;
        let prefix = pattern.trim_end_matches('*');
        Ok(values
            .iter()
            .filter(|(k, v)| !Self::is_expired(v) && k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// Redis-backed adapter, matching the source system's `redis.asyncio` usage.
/// `ConnectionManager` reconnects transparently, so a single instance can be
/// cloned freely across the coordinator and its background monitors.
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| MeshError::Kv(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| MeshError::Kv(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| MeshError::Kv(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(d) => conn
                .set_ex::<_, _, ()>(key, value, d.as_secs().max(1))
                .await
                .map_err(|e| MeshError::Kv(e.to_string())),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| MeshError::Kv(e.to_string())),
        }
    }

    async fn incr(&self, key: &str, by: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, by).await.map_err(|e| MeshError::Kv(e.to_string()))
    }

    async fn incrbyfloat(&self, key: &str, by: f64) -> Result<f64> {
        let mut conn = self.conn.clone();
        conn.incr(key, by).await.map_err(|e| MeshError::Kv(e.to_string()))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.keys(pattern).await.map_err(|e| MeshError::Kv(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_round_trip() {
        let kv = InMemoryKv::new();
        kv.set("k", "v", None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn incr_accumulates() {
        let kv = InMemoryKv::new();
        assert_eq!(kv.incr("c", 1).await.unwrap(), 1);
        assert_eq!(kv.incr("c", 4).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn incrbyfloat_accumulates() {
        let kv = InMemoryKv::new();
        assert_eq!(kv.incrbyfloat("cost", 1.5).await.unwrap(), 1.5);
        assert_eq!(kv.incrbyfloat("cost", 0.25).await.unwrap(), 1.75);
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let kv = InMemoryKv::new();
        kv.set("k", "v", Some(Duration::from_millis(5))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_matches_prefix_pattern() {
        let kv = InMemoryKv::new();
        kv.set("usage:2026-01-01:progressive", "1", None).await.unwrap();
        kv.set("usage:2026-01-01:baseline", "1", None).await.unwrap();
        kv.set("quota:u1:10", "1", None).await.unwrap();
        let mut matched = kv.keys("usage:2026-01-01:*").await.unwrap();
        matched.sort();
        assert_eq!(
            matched,
            vec!["usage:2026-01-01:baseline".to_string(), "usage:2026-01-01:progressive".to_string()]
        );
    }
}
