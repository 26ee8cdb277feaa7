//! Reminder delivery ledger
//!
//! Records which reminder checkpoints have already been delivered per
//! session, so a re-spawned scheduler (after a crash or restart) skips them
//! instead of sending duplicates. Two drivers exist:
//! - Redis - durable across process restarts, for production
//! - In-memory (moka) - single-instance development and tests
//!
//! Entries are TTL-bounded: a session cannot matter for reminder purposes
//! beyond the retention window, so records expire on their own.
//!
//! The ledger driver is selected based on configuration.

pub mod memory;
#[cfg(feature = "redis-dedup")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DedupConfig, DedupDriver};

/// Delivery ledger trait
///
/// Concurrent calls for the same `(session_id, checkpoint)` pair are
/// idempotent: repeated `mark_sent` calls are harmless, and `is_sent`
/// reflects any prior successful `mark_sent`.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Record that the checkpoint was delivered (or at least attempted)
    async fn mark_sent(&self, session_id: &str, checkpoint: i64) -> Result<()>;

    /// Check whether the checkpoint was already delivered
    async fn is_sent(&self, session_id: &str, checkpoint: i64) -> Result<bool>;
}

pub use memory::MemoryDedup;
#[cfg(feature = "redis-dedup")]
pub use redis::RedisDedup;

/// Create a delivery ledger based on configuration.
///
/// # Errors
/// - Returns an error if Redis is configured but the `redis-dedup` feature
///   is not enabled
/// - Returns an error if the Redis connection fails
pub async fn create_dedup(config: &DedupConfig) -> Result<Arc<dyn DedupStore>> {
    let ttl = Duration::from_secs(config.ttl_seconds);

    match config.driver {
        DedupDriver::Memory => Ok(Arc::new(MemoryDedup::with_ttl(ttl))),
        DedupDriver::Redis => {
            #[cfg(feature = "redis-dedup")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using the redis dedup driver. \
                         Set 'redis_url' in the dedup configuration or use \
                         PARKPING_DEDUP_REDIS_URL."
                    )
                })?;

                let store = RedisDedup::connect(redis_url, ttl).await?;
                Ok(Arc::new(store))
            }

            #[cfg(not(feature = "redis-dedup"))]
            {
                anyhow::bail!(
                    "The redis dedup driver is configured but the 'redis-dedup' feature is \
                     not enabled. Either rebuild with `--features redis-dedup` or use the \
                     'memory' driver."
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_dedup() {
        let config = DedupConfig::default();
        let store = create_dedup(&config).await.unwrap();

        store.mark_sent("session-1", 20).await.unwrap();
        assert!(store.is_sent("session-1", 20).await.unwrap());
        assert!(!store.is_sent("session-1", 10).await.unwrap());
    }

    #[cfg(feature = "redis-dedup")]
    #[tokio::test]
    async fn test_create_redis_dedup_without_url() {
        let config = DedupConfig {
            driver: DedupDriver::Redis,
            redis_url: None,
            ttl_seconds: 86400,
        };

        let result = create_dedup(&config).await;
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("Redis URL"));
    }

    #[cfg(not(feature = "redis-dedup"))]
    #[tokio::test]
    async fn test_create_redis_dedup_without_feature() {
        let config = DedupConfig {
            driver: DedupDriver::Redis,
            redis_url: Some("redis://localhost:6379".to_string()),
            ttl_seconds: 86400,
        };

        let result = create_dedup(&config).await;
        assert!(result.is_err());
        let err = result.err().unwrap().to_string();
        assert!(err.contains("redis-dedup") && err.contains("feature"));
    }
}
