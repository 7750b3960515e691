use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::CacheFacade;
use super::key;

/// Static rule describing which cache entries a mutated resource kind
/// sweeps. Configured, never inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRule {
    pub kind: String,
    /// Endpoint prefixes whose entries are keyed by the resource id.
    pub entity_prefixes: Vec<String>,
    /// Name of the parameter carrying the resource id in entity cache keys.
    pub id_param: String,
    /// Endpoint prefixes aggregating this kind (lists), swept wholesale.
    pub list_prefixes: Vec<String>,
}

/// Removes cache entries related to a mutated resource.
///
/// Sweep failures never fail the triggering mutation: the remote tier is
/// retried once in the background, then entries are left to expire by TTL.
pub struct InvalidationManager {
    facade: Arc<CacheFacade>,
    rules: HashMap<String, InvalidationRule>,
    retry_delay: Duration,
}

impl InvalidationManager {
    #[must_use]
    pub fn new(
        facade: Arc<CacheFacade>,
        rules: Vec<InvalidationRule>,
        retry_delay: Duration,
    ) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| (rule.kind.clone(), rule))
            .collect();
        Self {
            facade,
            rules,
            retry_delay,
        }
    }

    /// Sweep every entry related to resource `kind`/`id`.
    pub async fn invalidate(&self, kind: &str, id: &str) {
        let Some(rule) = self.rules.get(kind) else {
            debug!(kind, "no invalidation rule; nothing to sweep");
            return;
        };
        for (prefix, token) in targets(rule, id) {
            match self
                .facade
                .invalidate_matching(&prefix, token.as_deref())
                .await
            {
                Ok(removed) => debug!(prefix, removed, "cache entries invalidated"),
                Err(err) => {
                    warn!(prefix, error = %err, "cache invalidation failed; scheduling retry");
                    self.spawn_retry(prefix, token);
                }
            }
        }
    }

    fn spawn_retry(&self, prefix: String, token: Option<String>) {
        let facade = Arc::clone(&self.facade);
        let delay = self.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match facade.invalidate_matching(&prefix, token.as_deref()).await {
                Ok(removed) => debug!(prefix, removed, "cache invalidation retry succeeded"),
                Err(err) => {
                    error!(prefix, error = %err, "cache invalidation retry failed; entries expire by TTL");
                }
            }
        });
    }
}

/// Expand a rule into `(prefix, token)` sweep targets for one resource id.
fn targets(rule: &InvalidationRule, id: &str) -> Vec<(String, Option<String>)> {
    let token = key::param_token(&rule.id_param, id);
    rule.entity_prefixes
        .iter()
        .map(|p| (key::endpoint_prefix(p), Some(token.clone())))
        .chain(
            rule.list_prefixes
                .iter()
                .map(|p| (key::endpoint_prefix(p), None)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::infra::cache::memory::MemoryStore;
    use crate::infra::cache::store::CacheStore;
    use crate::test_support::{ManualClock, UnreliableStore};

    fn issue_rule() -> InvalidationRule {
        InvalidationRule {
            kind: "issue".into(),
            entity_prefixes: vec!["issues.get".into()],
            id_param: "id".into(),
            list_prefixes: vec!["issues.list".into()],
        }
    }

    struct Fixture {
        manager: Arc<InvalidationManager>,
        remote: Arc<UnreliableStore>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let remote = Arc::new(UnreliableStore::new(clock.clone()));
        let local = Arc::new(MemoryStore::new(clock.clone()));
        let facade = Arc::new(CacheFacade::new(
            remote.clone(),
            local,
            Duration::from_millis(250),
            clock,
        ));
        Fixture {
            manager: Arc::new(InvalidationManager::new(
                facade,
                vec![issue_rule()],
                Duration::from_millis(10),
            )),
            remote,
        }
    }

    async fn seed(store: &UnreliableStore, keys: &[&str]) {
        for key in keys {
            store
                .put(key, Bytes::from_static(b"{}"), Duration::from_secs(300))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn sweeps_entity_and_dependent_lists_only() {
        let f = fixture();
        seed(
            &f.remote,
            &[
                "issues.get:id=123",
                "issues.get:id=456",
                "issues.list:project=p1",
                "projects.get:project=p1",
            ],
        )
        .await;

        f.manager.invalidate("issue", "123").await;

        assert!(f.remote.get("issues.get:id=123").await.unwrap().is_none());
        assert!(f.remote.get("issues.list:project=p1").await.unwrap().is_none());
        // Unrelated entries stay.
        assert!(f.remote.get("issues.get:id=456").await.unwrap().is_some());
        assert!(f.remote.get("projects.get:project=p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_kind_is_a_no_op() {
        let f = fixture();
        seed(&f.remote, &["issues.get:id=123"]).await;
        f.manager.invalidate("sprint", "9").await;
        assert!(f.remote.get("issues.get:id=123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remote_outage_is_retried_in_background() {
        let f = fixture();
        seed(&f.remote, &["issues.get:id=123"]).await;

        f.remote.set_available(false);
        // Must not fail even though the remote sweep does.
        f.manager.invalidate("issue", "123").await;
        assert!(f.remote.peek("issues.get:id=123").is_some());

        f.remote.set_available(true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(f.remote.get("issues.get:id=123").await.unwrap().is_none());
    }
}
