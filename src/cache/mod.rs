//! Revocation cache.
//!
//! A small key/value store with per-entry expiry that holds the token
//! blacklist, subject-wide revocation watermarks and CSRF secret hashes.
//! Two backends exist: an in-process map for single-node deployments and
//! tests, and Redis for shared state across nodes.

mod memory;
#[cfg(feature = "redis")]
mod redis_cache;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::{CacheBackend, CacheConfig};
use crate::Result;

/// Key/value store with expiry.
///
/// Implementations must treat a zero TTL as "do not store".
#[async_trait]
pub trait RevocationCache: Send + Sync {
    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Store a value only if no live value exists.
    ///
    /// Returns `true` when this call inserted the value. Atomic with respect
    /// to other callers of the same cache.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Remove a value.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether a live value exists.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Drop expired entries. Returns how many were removed.
    ///
    /// Backends that expire keys themselves keep the default.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Run [`RevocationCache::purge_expired`] periodically in the background.
pub fn start_purge_task(cache: Arc<dyn RevocationCache>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "Purged expired cache entries");
            }
        }
    });
}

/// Hex SHA-256 digest.
pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Blacklist key for a raw token. The token itself is never stored.
pub fn blacklist_key(token: &str) -> String {
    format!("blacklist:{}", sha256_hex(token))
}

/// Subject-wide revocation watermark key.
pub fn revoked_before_key(user_id: i64) -> String {
    format!("revoked-before:{user_id}")
}

/// CSRF secret hash key.
pub fn csrf_key(user_id: i64) -> String {
    format!("csrf:{user_id}")
}

/// Build the configured cache backend.
pub async fn connect(config: &CacheConfig) -> Result<Arc<dyn RevocationCache>> {
    match config.backend {
        CacheBackend::Memory => {
            tracing::info!("Using in-memory revocation cache");
            Ok(Arc::new(MemoryCache::new()))
        }
        #[cfg(feature = "redis")]
        CacheBackend::Redis => {
            tracing::info!("Using Redis revocation cache");
            Ok(Arc::new(RedisCache::connect(&config.redis_url).await?))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => Err(crate::WardenError::Config(
            "redis cache backend requires the `redis` feature".to_string(),
        )),
    }
}
