//! In-memory delivery ledger using moka
//!
//! Fast, thread-safe, TTL-bounded. Contents are lost on restart, so this
//! driver only upholds the no-duplicate guarantee within a single process
//! lifetime. Use the Redis driver in production.

use super::DedupStore;
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;

/// Default retention window for delivery records (24 hours)
const DEFAULT_TTL: Duration = Duration::from_secs(86400);

/// Default maximum number of entries
const DEFAULT_MAX_CAPACITY: u64 = 100_000;

/// In-memory delivery ledger
pub struct MemoryDedup {
    /// One entry per delivered `(session, checkpoint)` pair
    entries: Cache<String, ()>,
}

impl std::fmt::Debug for MemoryDedup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDedup")
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

impl MemoryDedup {
    /// Create a ledger with the default 24h retention window
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a ledger with a custom retention window
    pub fn with_ttl(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(DEFAULT_MAX_CAPACITY)
            .time_to_live(ttl)
            .build();

        Self { entries }
    }

    fn key(session_id: &str, checkpoint: i64) -> String {
        format!("{}:{}", session_id, checkpoint)
    }
}

impl Default for MemoryDedup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupStore for MemoryDedup {
    async fn mark_sent(&self, session_id: &str, checkpoint: i64) -> Result<()> {
        self.entries
            .insert(Self::key(session_id, checkpoint), ())
            .await;
        Ok(())
    }

    async fn is_sent(&self, session_id: &str, checkpoint: i64) -> Result<bool> {
        Ok(self
            .entries
            .get(&Self::key(session_id, checkpoint))
            .await
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_and_check() {
        let store = MemoryDedup::new();

        assert!(!store.is_sent("s1", 20).await.unwrap());

        store.mark_sent("s1", 20).await.unwrap();
        assert!(store.is_sent("s1", 20).await.unwrap());

        // Other checkpoints and sessions are unaffected
        assert!(!store.is_sent("s1", 10).await.unwrap());
        assert!(!store.is_sent("s2", 20).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_sent_is_idempotent() {
        let store = MemoryDedup::new();

        store.mark_sent("s1", 0).await.unwrap();
        store.mark_sent("s1", 0).await.unwrap();

        assert!(store.is_sent("s1", 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryDedup::with_ttl(Duration::from_millis(50));

        store.mark_sent("s1", 20).await.unwrap();
        assert!(store.is_sent("s1", 20).await.unwrap());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!store.is_sent("s1", 20).await.unwrap());
    }
}
