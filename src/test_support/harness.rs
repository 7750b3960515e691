//! Assembled gateway over mock collaborators, plus the standard endpoint
//! fixture used across tests.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;

use crate::app::TrackerGateway;
use crate::config::{
    BulkSettings, CachePolicyConfig, CacheSettings, EndpointConfig, GatewayConfig,
    InvalidatesConfig, InvalidationRuleConfig, MethodConfig, UpstreamSettings,
};
use crate::domain::services::bulk::BulkCoordinator;
use crate::domain::services::gateway::GatewayService;
use crate::infra::cache::CacheFacade;

use super::clock::ManualClock;
use super::mock::{MockTrackerHandler, UnreliableStore};

fn read(
    id: &str,
    templates: &[(&str, &str)],
    path: &[&str],
    query: &[&str],
    ttl: Option<u64>,
) -> EndpointConfig {
    EndpointConfig {
        id: id.to_owned(),
        method: MethodConfig::Get,
        templates: templates
            .iter()
            .map(|&(s, t)| (s.to_owned(), t.to_owned()))
            .collect(),
        path_params: path.iter().map(|&p| p.to_owned()).collect(),
        query_params: query.iter().map(|&q| q.to_owned()).collect(),
        cache: ttl.map(|ttl_seconds| CachePolicyConfig {
            ttl_seconds,
            cacheable: true,
        }),
        invalidates: None,
    }
}

fn mutation(id: &str, template: &str) -> EndpointConfig {
    EndpointConfig {
        id: id.to_owned(),
        method: MethodConfig::Post,
        templates: HashMap::from([("upstream".to_owned(), template.to_owned())]),
        path_params: vec!["id".to_owned()],
        query_params: vec![],
        cache: None,
        invalidates: Some(InvalidatesConfig {
            kind: "issue".to_owned(),
            id_param: "id".to_owned(),
        }),
    }
}

/// Standard configuration: a small issue-tracker endpoint set with cacheable
/// reads, three bulk mutation endpoints, and an `issue` invalidation rule.
#[must_use]
pub fn fixture_config() -> GatewayConfig {
    GatewayConfig {
        upstream: UpstreamSettings {
            base_url: "http://tracker.invalid".to_owned(),
            ..UpstreamSettings::default()
        },
        cache: CacheSettings {
            remote_timeout_ms: 250,
            invalidation_retry_ms: 20,
        },
        bulk: BulkSettings::default(),
        endpoints: vec![
            read(
                "issues.get",
                &[
                    ("client", "/api/issues/{id}"),
                    ("upstream", "/rest/v2/issues/{id}"),
                ],
                &["id"],
                &["fields"],
                Some(60),
            ),
            read(
                "issues.list",
                &[
                    ("client", "/api/projects/{project}/issues"),
                    ("upstream", "/rest/v2/projects/{project}/issues"),
                ],
                &["project"],
                &["page", "state"],
                Some(30),
            ),
            read("issues.search", &[("upstream", "/rest/v2/search")], &[], &["q"], None),
            read(
                "comments.get",
                &[("upstream", "/rest/v2/issues/{id}/comments/{comment}")],
                &["id", "comment"],
                &[],
                Some(60),
            ),
            mutation("issues.set_status", "/rest/v2/issues/{id}/status"),
            mutation("issues.assign", "/rest/v2/issues/{id}/assignee"),
            mutation("issues.tag", "/rest/v2/issues/{id}/tags"),
        ],
        invalidation: vec![InvalidationRuleConfig {
            kind: "issue".to_owned(),
            entity_prefixes: vec!["issues.get".to_owned()],
            id_param: "id".to_owned(),
            list_prefixes: vec!["issues.list".to_owned()],
        }],
    }
}

pub struct TestGatewayBuilder {
    config: GatewayConfig,
}

impl TestGatewayBuilder {
    /// Adjust the fixture configuration before building.
    #[must_use]
    pub fn config(mut self, adjust: impl FnOnce(&mut GatewayConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    #[must_use]
    pub fn build(self) -> TestGateway {
        let clock = Arc::new(ManualClock::default());
        let remote = Arc::new(UnreliableStore::new(clock.clone()));
        let handler = Arc::new(MockTrackerHandler::new());
        let app = TrackerGateway::with_parts(
            &self.config,
            remote.clone(),
            handler.clone(),
            clock.clone(),
        )
        .expect("test gateway config");
        TestGateway {
            app,
            clock,
            remote,
            handler,
        }
    }
}

/// A gateway wired to a scripted upstream, a toggleable remote store, and a
/// manual clock.
pub struct TestGateway {
    app: TrackerGateway,
    pub clock: Arc<ManualClock>,
    pub remote: Arc<UnreliableStore>,
    pub handler: Arc<MockTrackerHandler>,
}

impl TestGateway {
    #[must_use]
    pub fn builder() -> TestGatewayBuilder {
        TestGatewayBuilder {
            config: fixture_config(),
        }
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<GatewayService> {
        self.app.gateway()
    }

    #[must_use]
    pub fn bulk(&self) -> &Arc<BulkCoordinator> {
        self.app.bulk()
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheFacade> {
        self.app.cache()
    }

    #[must_use]
    pub fn router(&self) -> Router {
        self.app.router()
    }
}
