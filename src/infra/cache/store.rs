use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;

/// A stored value with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Bytes,
    pub expires_at: Instant,
}

impl CacheEntry {
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Failures of a cache tier. `Unavailable` makes the facade fall back to the
/// local tier; neither variant ever reaches a gateway caller.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache backend error: {0}")]
    Internal(String),
}

/// Key-value store with TTL semantics. The remote tier and the in-process
/// fallback tier implement the same contract.
///
/// Implementations must never return an entry past its expiry.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// # Errors
    ///
    /// `Unavailable` when the backend cannot be reached, `Internal` for
    /// backend-side failures.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// # Errors
    ///
    /// See [`Self::get`].
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;

    /// Remove one key. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    async fn remove(&self, key: &str) -> Result<u64, StoreError>;

    /// Remove every key starting with `prefix`.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    async fn remove_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    /// Remove every key starting with `prefix` whose parameter list contains
    /// `token` as a complete `name=value` pair. A remote backend would
    /// implement this as a SCAN + DEL sweep.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    async fn remove_matching(&self, prefix: &str, token: &str) -> Result<u64, StoreError>;
}
