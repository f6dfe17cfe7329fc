//! Redis-backed preview store.
//!
//! Entries are JSON strings under `<prefix><id>` with a server-side TTL,
//! so expiry needs no sweeper.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use reel_models::{PreviewEntry, PreviewId};

use crate::config::DEFAULT_KEY_PREFIX;
use crate::error::PreviewResult;
use crate::store::PreviewStore;

/// PSETEX expiry for `ttl`. Redis rejects zero, so the floor is 1ms.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

pub struct RedisPreviewStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPreviewStore {
    pub fn new(redis_url: &str, key_prefix: impl Into<String>) -> PreviewResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
        })
    }

    /// Connect with the default `preview_image:` prefix.
    pub fn with_default_prefix(redis_url: &str) -> PreviewResult<Self> {
        Self::new(redis_url, DEFAULT_KEY_PREFIX)
    }

    fn key(&self, id: &PreviewId) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    fn decode(raw: Option<String>) -> PreviewResult<Option<PreviewEntry>> {
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }
}

#[async_trait]
impl PreviewStore for RedisPreviewStore {
    async fn put(&self, entry: PreviewEntry, ttl: Duration) -> PreviewResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = self.key(&entry.id);
        let payload = serde_json::to_string(&entry)?;
        let millis = ttl_millis(ttl);
        let _: () = conn.pset_ex(&key, payload, millis).await?;
        debug!(key = %key, ttl_ms = millis, "Stored preview");
        Ok(())
    }

    async fn get(&self, id: &PreviewId) -> PreviewResult<Option<PreviewEntry>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.key(id)).await?;
        Self::decode(raw)
    }

    async fn delete(&self, id: &PreviewId) -> PreviewResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let removed: i64 = conn.del(self.key(id)).await?;
        Ok(removed > 0)
    }

    async fn take(&self, id: &PreviewId) -> PreviewResult<Option<PreviewEntry>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(self.key(id))
            .query_async(&mut conn)
            .await?;
        Self::decode(raw)
    }

    async fn exists(&self, id: &PreviewId) -> PreviewResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = conn.exists(self.key(id)).await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_uses_prefix() {
        let store = RedisPreviewStore::with_default_prefix("redis://localhost:6379").unwrap();
        let id = PreviewId::from_string("abc123");
        assert_eq!(store.key(&id), "preview_image:abc123");
    }

    #[test]
    fn test_ttl_keeps_sub_second_precision() {
        assert_eq!(ttl_millis(Duration::from_millis(500)), 500);
        assert_eq!(ttl_millis(Duration::from_millis(1900)), 1900);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_decode_miss_and_garbage() {
        assert!(RedisPreviewStore::decode(None).unwrap().is_none());
        assert!(RedisPreviewStore::decode(Some("{not json".to_string())).is_err());
    }
}
