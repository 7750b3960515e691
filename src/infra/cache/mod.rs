pub mod invalidation;
pub mod key;
pub mod memory;
pub mod store;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::domain::error::GatewayError;
use crate::domain::model::CacheStatus;
use crate::infra::clock::Clock;

use store::{CacheEntry, CacheStore, StoreError};

/// Result of a read through the facade.
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub value: Bytes,
    pub status: CacheStatus,
    pub ttl_remaining: Duration,
}

/// Which tier answered the read phase of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Remote,
    Local,
}

enum ReadOutcome {
    Hit(CacheEntry),
    Miss(Tier),
}

/// Two-tier read-through cache: a remote key-value store backed by an
/// in-process fallback with the same TTL semantics.
///
/// Every call runs the state machine
/// `TryRemote -> (Hit | MissFallthrough | Unavailable -> TryLocal)`.
/// Backend unavailability is absorbed: the call degrades to the local tier,
/// logs a warning and bumps [`Self::degraded_events`]. A normal remote miss
/// does NOT consult the local tier; the two states are kept distinct so they
/// can be observed separately.
pub struct CacheFacade {
    remote: Arc<dyn CacheStore>,
    local: Arc<dyn CacheStore>,
    remote_timeout: Duration,
    clock: Arc<dyn Clock>,
    degraded_events: AtomicU64,
}

impl CacheFacade {
    #[must_use]
    pub fn new(
        remote: Arc<dyn CacheStore>,
        local: Arc<dyn CacheStore>,
        remote_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            remote,
            local,
            remote_timeout,
            clock,
            degraded_events: AtomicU64::new(0),
        }
    }

    /// Number of calls that fell back to the local tier because the remote
    /// store was unreachable or timed out.
    #[must_use]
    pub fn degraded_events(&self) -> u64 {
        self.degraded_events.load(Ordering::Relaxed)
    }

    /// Serve `key` from cache or run `compute` and store the result with
    /// `ttl` in the tier that answered.
    ///
    /// `bypass` skips the read but still refreshes the cache, so the next
    /// plain read observes the fresh value.
    ///
    /// There is no single-flight deduplication: concurrent callers missing
    /// on the same key may each run `compute`.
    ///
    /// # Errors
    ///
    /// Only `compute` errors propagate; cache backend trouble falls back
    /// silently.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        bypass: bool,
        compute: F,
    ) -> Result<CachedValue, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, GatewayError>>,
    {
        if bypass {
            let value = compute().await?;
            self.write(Tier::Remote, key, value.clone(), ttl).await;
            return Ok(CachedValue {
                value,
                status: CacheStatus::Bypass,
                ttl_remaining: ttl,
            });
        }

        match self.read(key).await {
            ReadOutcome::Hit(entry) => {
                debug!(key, "cache hit");
                Ok(CachedValue {
                    ttl_remaining: entry.remaining_at(self.clock.now()),
                    value: entry.value,
                    status: CacheStatus::Hit,
                })
            }
            ReadOutcome::Miss(tier) => {
                debug!(key, ?tier, "cache miss");
                let value = compute().await?;
                self.write(tier, key, value.clone(), ttl).await;
                Ok(CachedValue {
                    value,
                    status: CacheStatus::Miss,
                    ttl_remaining: ttl,
                })
            }
        }
    }

    /// Remove entries matching `prefix` (and, if given, the `token`
    /// parameter pair) from both tiers.
    ///
    /// The local tier is always swept; its errors are only logged. The
    /// returned result reflects the remote tier so callers can schedule a
    /// retry.
    ///
    /// # Errors
    ///
    /// `StoreError` from the remote tier, including timeouts.
    pub async fn invalidate_matching(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<u64, StoreError> {
        let local_result = match token {
            Some(token) => self.local.remove_matching(prefix, token).await,
            None => self.local.remove_prefix(prefix).await,
        };
        if let Err(err) = local_result {
            warn!(prefix, error = %err, "local cache sweep failed");
        }

        let remote = async {
            match token {
                Some(token) => self.remote.remove_matching(prefix, token).await,
                None => self.remote.remove_prefix(prefix).await,
            }
        };
        match tokio::time::timeout(self.remote_timeout, remote).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "sweep timed out after {:?}",
                self.remote_timeout
            ))),
        }
    }

    async fn read(&self, key: &str) -> ReadOutcome {
        match self.remote_get(key).await {
            Ok(Some(entry)) => ReadOutcome::Hit(entry),
            Ok(None) => ReadOutcome::Miss(Tier::Remote),
            Err(err) => {
                self.note_degraded(key, "read", &err);
                match self.local.get(key).await {
                    Ok(Some(entry)) => ReadOutcome::Hit(entry),
                    Ok(None) => ReadOutcome::Miss(Tier::Local),
                    Err(err) => {
                        warn!(key, error = %err, "local cache read failed");
                        ReadOutcome::Miss(Tier::Local)
                    }
                }
            }
        }
    }

    async fn remote_get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        match tokio::time::timeout(self.remote_timeout, self.remote.get(key)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "read timed out after {:?}",
                self.remote_timeout
            ))),
        }
    }

    /// Write to `tier`, degrading a failed remote write to the local tier so
    /// the computed value is not lost.
    async fn write(&self, tier: Tier, key: &str, value: Bytes, ttl: Duration) {
        if tier == Tier::Remote {
            let put = self.remote.put(key, value.clone(), ttl);
            match tokio::time::timeout(self.remote_timeout, put).await {
                Ok(Ok(())) => return,
                Ok(Err(err)) => self.note_degraded(key, "write", &err),
                Err(_) => self.note_degraded(
                    key,
                    "write",
                    &StoreError::Unavailable(format!(
                        "write timed out after {:?}",
                        self.remote_timeout
                    )),
                ),
            }
        }
        if let Err(err) = self.local.put(key, value, ttl).await {
            warn!(key, error = %err, "local cache write failed");
        }
    }

    fn note_degraded(&self, key: &str, op: &str, err: &StoreError) {
        self.degraded_events.fetch_add(1, Ordering::Relaxed);
        warn!(key, op, error = %err, "remote cache unavailable; falling back to local store");
    }
}
