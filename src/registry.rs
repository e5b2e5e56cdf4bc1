//! Application registry — the external key-value store holding the set of
//! currently watched applications.
//!
//! Records live under `application:status:<application_id>` as the JSON wire
//! form of [`Application`]. The core only ever scans and reads; the HTTP CRUD
//! surface writes. Iteration order is whatever the store yields — callers
//! must not rely on it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};

use crate::core::errors::CheckError;
use crate::core::types::Application;

pub const KEY_PREFIX: &str = "application:status:";

fn key_for(application_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, application_id)
}

/// Decode one raw registry record. A malformed record is a `Data` error the
/// sweep skips without aborting.
pub fn parse_record(key: &str, raw: &str) -> Result<Application, CheckError> {
    serde_json::from_str(raw).map_err(|e| CheckError::Data {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Fold one per-key GET outcome into the scan result. An expired or
/// unreadable key is skipped so a single bad record cannot sink the whole
/// scan — the sweep processes whatever was readable.
fn readable_record(key: String, fetched: RedisResult<Option<String>>) -> Option<(String, String)> {
    match fetched {
        Ok(Some(raw)) => Some((key, raw)),
        // A key can expire between SCAN and GET; just skip it.
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("skipping unreadable registry key {}: {}", key, e);
            None
        }
    }
}

/// Storage seam consumed by the sweep and the CRUD surface.
#[async_trait]
pub trait ApplicationRegistry: Send + Sync {
    /// All records under the key prefix as `(key, raw_json)` pairs.
    async fn scan_all(&self) -> Result<Vec<(String, String)>, CheckError>;
    async fn get(&self, application_id: &str) -> Result<Option<String>, CheckError>;
    async fn put(&self, app: &Application) -> Result<(), CheckError>;
    /// Returns whether a record was actually removed.
    async fn delete(&self, application_id: &str) -> Result<bool, CheckError>;
}

/// Redis-backed registry. The multiplexed connection is cheap to clone and
/// safe to share across the sweep task and the HTTP handlers.
pub struct RedisRegistry {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisRegistry {
    /// Connect and ping once so a bad URL fails at startup, not mid-sweep.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).with_context(|| format!("redis url {}", url))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .context("redis connect")?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis ping")?;
        tracing::info!("connected to redis at {}", url);
        Ok(Self { conn })
    }
}

#[async_trait]
impl ApplicationRegistry for RedisRegistry {
    async fn scan_all(&self) -> Result<Vec<(String, String)>, CheckError> {
        let mut conn = self.conn.clone();

        // SCAN borrows the connection for the whole cursor walk; collect the
        // keys first, then GET them over the same connection.
        let keys: Vec<String> = {
            let mut iter = conn
                .scan_match::<_, String>(format!("{}*", KEY_PREFIX))
                .await
                .map_err(|e| CheckError::Transport(format!("redis scan: {}", e)))?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let fetched: RedisResult<Option<String>> = conn.get(&key).await;
            if let Some(record) = readable_record(key, fetched) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn get(&self, application_id: &str) -> Result<Option<String>, CheckError> {
        let mut conn = self.conn.clone();
        conn.get(key_for(application_id))
            .await
            .map_err(|e| CheckError::Transport(format!("redis get: {}", e)))
    }

    async fn put(&self, app: &Application) -> Result<(), CheckError> {
        let raw = serde_json::to_string(app)
            .map_err(|e| CheckError::Transport(format!("encode record: {}", e)))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key_for(&app.application_id), raw)
            .await
            .map_err(|e| CheckError::Transport(format!("redis set: {}", e)))
    }

    async fn delete(&self, application_id: &str) -> Result<bool, CheckError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .del(key_for(application_id))
            .await
            .map_err(|e| CheckError::Transport(format!("redis del: {}", e)))?;
        Ok(removed > 0)
    }
}

/// In-memory registry used by tests and local dry runs. BTreeMap keeps
/// iteration deterministic, which the Redis implementation does not promise.
#[derive(Default)]
pub struct MemoryRegistry {
    records: Mutex<BTreeMap<String, String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw record verbatim, bypassing `Application` encoding. Lets
    /// tests plant malformed records.
    pub fn put_raw(&self, application_id: &str, raw: &str) {
        self.records
            .lock()
            .expect("registry lock poisoned")
            .insert(key_for(application_id), raw.to_string());
    }
}

#[async_trait]
impl ApplicationRegistry for MemoryRegistry {
    async fn scan_all(&self) -> Result<Vec<(String, String)>, CheckError> {
        Ok(self
            .records
            .lock()
            .expect("registry lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn get(&self, application_id: &str) -> Result<Option<String>, CheckError> {
        Ok(self
            .records
            .lock()
            .expect("registry lock poisoned")
            .get(&key_for(application_id))
            .cloned())
    }

    async fn put(&self, app: &Application) -> Result<(), CheckError> {
        let raw = serde_json::to_string(app)
            .map_err(|e| CheckError::Transport(format!("encode record: {}", e)))?;
        self.records
            .lock()
            .expect("registry lock poisoned")
            .insert(key_for(&app.application_id), raw);
        Ok(())
    }

    async fn delete(&self, application_id: &str) -> Result<bool, CheckError> {
        Ok(self
            .records
            .lock()
            .expect("registry lock poisoned")
            .remove(&key_for(application_id))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str) -> Application {
        Application {
            location: "BEJ".into(),
            application_id: id.into(),
            passport_number: "P123".into(),
            surname_prefix: "ZHANG".into(),
        }
    }

    #[tokio::test]
    async fn memory_registry_round_trips_records() {
        let registry = MemoryRegistry::new();
        registry.put(&app("AA001")).await.unwrap();

        let raw = registry.get("AA001").await.unwrap().unwrap();
        let decoded = parse_record("application:status:AA001", &raw).unwrap();
        assert_eq!(decoded, app("AA001"));

        assert!(registry.delete("AA001").await.unwrap());
        assert!(!registry.delete("AA001").await.unwrap());
        assert!(registry.get("AA001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_all_returns_prefixed_keys() {
        let registry = MemoryRegistry::new();
        registry.put(&app("AA001")).await.unwrap();
        registry.put(&app("BB002")).await.unwrap();

        let records = registry.scan_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|(k, _)| k.starts_with(KEY_PREFIX)));
    }

    #[test]
    fn unreadable_key_is_skipped_not_fatal() {
        let key = || "application:status:AA001".to_string();

        let err = redis::RedisError::from((redis::ErrorKind::IoError, "connection dropped"));
        assert!(readable_record(key(), Err(err)).is_none());

        // Expired between SCAN and GET.
        assert!(readable_record(key(), Ok(None)).is_none());

        assert_eq!(
            readable_record(key(), Ok(Some("{}".into()))),
            Some((key(), "{}".into()))
        );
    }

    #[test]
    fn malformed_record_is_a_data_error() {
        let err = parse_record("application:status:AA001", "{not json").unwrap_err();
        assert!(matches!(err, CheckError::Data { .. }));
        assert_eq!(err.kind(), "data");
    }
}
