//! Scripted collaborators: a mock tracker API handler and a cache store
//! whose availability tests can toggle.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Value, json};

use crate::domain::error::UpstreamError;
use crate::domain::model::{HttpMethod, ResolvedPath};
use crate::domain::services::UpstreamHandler;
use crate::infra::cache::memory::MemoryStore;
use crate::infra::cache::store::{CacheEntry, CacheStore, StoreError};
use crate::test_support::ManualClock;

/// A captured upstream call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub method: HttpMethod,
    pub payload: Option<Value>,
}

enum Script {
    Respond(Value),
    Fail(UpstreamError),
    Delay(Duration),
}

/// Scripted stand-in for the tracker API.
///
/// Rules match on a substring of the resolved path; the most recently
/// registered match wins. Unmatched calls succeed with
/// `{"ok": true, "path": ...}` so tests only script what they assert on.
#[derive(Default)]
pub struct MockTrackerHandler {
    rules: Mutex<Vec<(String, Script)>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
}

impl MockTrackerHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `value` for paths containing `needle`.
    pub fn respond(&self, needle: &str, value: Value) {
        self.push_rule(needle, Script::Respond(value));
    }

    /// Fail with `err` for paths containing `needle`.
    pub fn fail(&self, needle: &str, err: UpstreamError) {
        self.push_rule(needle, Script::Fail(err));
    }

    /// Sleep for `delay` before answering paths containing `needle`.
    pub fn delay(&self, needle: &str, delay: Duration) {
        self.push_rule(needle, Script::Delay(delay));
    }

    fn push_rule(&self, needle: &str, script: Script) {
        self.rules
            .lock()
            .expect("mock rules lock")
            .push((needle.to_owned(), script));
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock calls lock").clone()
    }
}

#[async_trait::async_trait]
impl UpstreamHandler for MockTrackerHandler {
    async fn execute(
        &self,
        path: &ResolvedPath,
        method: HttpMethod,
        payload: Option<&Value>,
    ) -> Result<Value, UpstreamError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().expect("mock calls lock").push(RecordedCall {
            path: path.path.clone(),
            method,
            payload: payload.cloned(),
        });

        // The most recently registered response/failure rule wins; delays
        // stack independently so a path can be both slow and scripted.
        let mut delay = None;
        let mut outcome = None;
        {
            let rules = self.rules.lock().expect("mock rules lock");
            for (needle, script) in rules.iter() {
                if !path.path.contains(needle.as_str()) {
                    continue;
                }
                match script {
                    Script::Delay(d) => delay = Some(*d),
                    Script::Respond(value) => outcome = Some(Ok(value.clone())),
                    Script::Fail(err) => outcome = Some(Err(err.clone())),
                }
            }
        }
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        outcome.unwrap_or_else(|| Ok(json!({"ok": true, "path": path.path})))
    }
}

/// Wraps an in-memory store and simulates a backend outage on demand.
pub struct UnreliableStore {
    inner: MemoryStore,
    available: AtomicBool,
}

impl UnreliableStore {
    #[must_use]
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            inner: MemoryStore::new(clock),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Look up a key ignoring the simulated outage, for assertions on what
    /// the backend still holds while "down".
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        futures_util::future::FutureExt::now_or_never(self.inner.get(key))
            .and_then(Result::ok)
            .flatten()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("simulated outage".into()))
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for UnreliableStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.inner.put(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.remove(key).await
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.remove_prefix(prefix).await
    }

    async fn remove_matching(&self, prefix: &str, token: &str) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.remove_matching(prefix, token).await
    }
}
