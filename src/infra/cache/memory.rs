use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;

use crate::infra::clock::Clock;

use super::store::{CacheEntry, CacheStore, StoreError};

/// In-process store backed by `DashMap`. Serves as the fallback tier when
/// the remote store is unreachable.
///
/// Expired entries are evicted lazily on read; sharded locking keeps
/// unrelated keys from contending.
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of entries currently held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired_at(now) {
                return Ok(Some(entry.clone()));
            }
        }
        // Expired or absent; drop the stale entry if one was there.
        self.entries.remove_if(key, |_, e| e.is_expired_at(now));
        Ok(None)
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let entry = CacheEntry {
            value,
            expires_at: self.clock.now() + ttl,
        };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<u64, StoreError> {
        Ok(u64::from(self.entries.remove(key).is_some()))
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            if key.starts_with(prefix) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn remove_matching(&self, prefix: &str, token: &str) -> Result<u64, StoreError> {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            if key.starts_with(prefix) && has_param_token(key, token) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

/// True if the key's parameter list contains `token` as a complete
/// `name=value` pair. Keys look like `prefix:a=1&b=2`.
fn has_param_token(key: &str, token: &str) -> bool {
    key.split_once(':')
        .is_some_and(|(_, params)| params.split('&').any(|pair| pair == token))
}
