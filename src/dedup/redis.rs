//! Redis-backed delivery ledger
//!
//! Stores delivered checkpoints as a Redis set per session
//! (`session:reminders:<session_id>`) and refreshes the key's TTL on every
//! write. Durable across process restarts, which is what makes the startup
//! recovery sweep idempotent.

use super::DedupStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Redis-backed delivery ledger
pub struct RedisDedup {
    /// Multiplexed connection for async operations
    connection: MultiplexedConnection,
    /// Retention window applied to every session's record set, in seconds
    ttl_seconds: i64,
}

impl std::fmt::Debug for RedisDedup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisDedup")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl RedisDedup {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `ttl` - Retention window for delivery records
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            connection,
            ttl_seconds: ttl.as_secs().max(1) as i64,
        })
    }

    fn key(session_id: &str) -> String {
        format!("session:reminders:{}", session_id)
    }
}

#[async_trait]
impl DedupStore for RedisDedup {
    async fn mark_sent(&self, session_id: &str, checkpoint: i64) -> Result<()> {
        let mut conn = self.connection.clone();
        let key = Self::key(session_id);

        let _: () = conn
            .sadd(&key, checkpoint)
            .await
            .context("Failed to record delivered checkpoint in Redis")?;

        // Refresh retention on every write; the set dies with the session
        let _: () = conn
            .expire(&key, self.ttl_seconds)
            .await
            .context("Failed to set delivery record TTL in Redis")?;

        Ok(())
    }

    async fn is_sent(&self, session_id: &str, checkpoint: i64) -> Result<bool> {
        let mut conn = self.connection.clone();

        conn.sismember(Self::key(session_id), checkpoint)
            .await
            .context("Failed to check delivered checkpoint in Redis")
    }
}
