use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};

use crate::domain::model::{
    CachePolicy, EndpointDescriptor, HttpMethod, InvalidationBinding, PathTemplate,
};
use crate::domain::registry::{EndpointRegistry, RegistryError};
use crate::domain::services::bulk::BulkEndpoints;
use crate::infra::cache::invalidation::InvalidationRule;

/// Startup configuration failures. All fatal before the gateway serves.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("endpoint '{id}' template for surface '{surface}' is malformed: {detail}")]
    MalformedTemplate {
        id: String,
        surface: String,
        detail: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{detail}")]
    Invalid { detail: String },
}

/// Configuration for the gateway. Loaded once at startup; the endpoint set
/// is immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub bulk: BulkSettings,
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub invalidation: Vec<InvalidationRuleConfig>,
}

impl GatewayConfig {
    /// Load from a YAML file, with `TRACKGW_`-prefixed environment
    /// overrides (`TRACKGW_CACHE__REMOTE_TIMEOUT_MS=100`).
    ///
    /// # Errors
    ///
    /// `ConfigError::Load` for unreadable files or schema violations.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("TRACKGW_").split("__"))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Build the immutable endpoint registry, failing fast on any
    /// misconfiguration.
    ///
    /// # Errors
    ///
    /// `MalformedTemplate` for placeholder syntax problems, `Registry` for
    /// duplicate ids and declaration mismatches.
    pub fn build_registry(&self) -> Result<EndpointRegistry, ConfigError> {
        let mut descriptors = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            descriptors.push(endpoint.to_descriptor()?);
        }
        Ok(EndpointRegistry::new(descriptors)?)
    }

    /// # Errors
    ///
    /// `Invalid` when two rules claim the same resource kind.
    pub fn invalidation_rules(&self) -> Result<Vec<InvalidationRule>, ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.invalidation {
            if !seen.insert(rule.kind.as_str()) {
                return Err(ConfigError::Invalid {
                    detail: format!("duplicate invalidation rule for kind '{}'", rule.kind),
                });
            }
        }
        Ok(self.invalidation.iter().map(InvalidationRuleConfig::to_rule).collect())
    }
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Surface resolved for upstream calls.
    #[serde(default = "default_surface")]
    pub surface: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl UpstreamSettings {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            surface: default_surface(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:9100".to_owned()
}

fn default_surface() -> String {
    "upstream".to_owned()
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Budget for one remote store round trip before falling back locally.
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
    #[serde(default = "default_invalidation_retry_ms")]
    pub invalidation_retry_ms: u64,
}

impl CacheSettings {
    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    #[must_use]
    pub fn invalidation_retry(&self) -> Duration {
        Duration::from_millis(self.invalidation_retry_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            remote_timeout_ms: default_remote_timeout_ms(),
            invalidation_retry_ms: default_invalidation_retry_ms(),
        }
    }
}

fn default_remote_timeout_ms() -> u64 {
    250
}

fn default_invalidation_retry_ms() -> u64 {
    5_000
}

// ---------------------------------------------------------------------------
// Bulk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkSettings {
    /// Maximum operations in flight at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
    #[serde(default = "default_status_endpoint")]
    pub status_endpoint: String,
    #[serde(default = "default_assign_endpoint")]
    pub assign_endpoint: String,
    #[serde(default = "default_tag_endpoint")]
    pub tag_endpoint: String,
}

impl BulkSettings {
    #[must_use]
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    #[must_use]
    pub fn endpoints(&self) -> BulkEndpoints {
        BulkEndpoints {
            status: self.status_endpoint.clone(),
            assign: self.assign_endpoint.clone(),
            tag: self.tag_endpoint.clone(),
        }
    }
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            item_timeout_secs: default_item_timeout_secs(),
            status_endpoint: default_status_endpoint(),
            assign_endpoint: default_assign_endpoint(),
            tag_endpoint: default_tag_endpoint(),
        }
    }
}

fn default_max_in_flight() -> usize {
    8
}

fn default_item_timeout_secs() -> u64 {
    30
}

fn default_status_endpoint() -> String {
    "issues.set_status".to_owned()
}

fn default_assign_endpoint() -> String {
    "issues.assign".to_owned()
}

fn default_tag_endpoint() -> String {
    "issues.tag".to_owned()
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MethodConfig {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<MethodConfig> for HttpMethod {
    fn from(m: MethodConfig) -> Self {
        match m {
            MethodConfig::Get => Self::Get,
            MethodConfig::Post => Self::Post,
            MethodConfig::Put => Self::Put,
            MethodConfig::Patch => Self::Patch,
            MethodConfig::Delete => Self::Delete,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub id: String,
    pub method: MethodConfig,
    /// Surface name to raw path template.
    pub templates: HashMap<String, String>,
    #[serde(default)]
    pub path_params: Vec<String>,
    #[serde(default)]
    pub query_params: Vec<String>,
    #[serde(default)]
    pub cache: Option<CachePolicyConfig>,
    #[serde(default)]
    pub invalidates: Option<InvalidatesConfig>,
}

impl EndpointConfig {
    fn to_descriptor(&self) -> Result<EndpointDescriptor, ConfigError> {
        let mut templates = HashMap::with_capacity(self.templates.len());
        for (surface, raw) in &self.templates {
            let template =
                PathTemplate::parse(raw).map_err(|detail| ConfigError::MalformedTemplate {
                    id: self.id.clone(),
                    surface: surface.clone(),
                    detail,
                })?;
            templates.insert(surface.clone(), template);
        }
        Ok(EndpointDescriptor {
            id: self.id.clone(),
            method: self.method.into(),
            templates,
            path_params: self.path_params.clone(),
            query_params: self.query_params.clone(),
            cache: self.cache.as_ref().and_then(CachePolicyConfig::to_policy),
            invalidates: self.invalidates.as_ref().map(|i| InvalidationBinding {
                kind: i.kind.clone(),
                id_param: i.id_param.clone(),
            }),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CachePolicyConfig {
    pub ttl_seconds: u64,
    #[serde(default = "default_true")]
    pub cacheable: bool,
}

impl CachePolicyConfig {
    fn to_policy(&self) -> Option<CachePolicy> {
        self.cacheable.then(|| CachePolicy {
            ttl: Duration::from_secs(self.ttl_seconds),
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidatesConfig {
    pub kind: String,
    #[serde(default = "default_id_param")]
    pub id_param: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidationRuleConfig {
    pub kind: String,
    #[serde(default)]
    pub entity_prefixes: Vec<String>,
    #[serde(default = "default_id_param")]
    pub id_param: String,
    #[serde(default)]
    pub list_prefixes: Vec<String>,
}

impl InvalidationRuleConfig {
    fn to_rule(&self) -> InvalidationRule {
        InvalidationRule {
            kind: self.kind.clone(),
            entity_prefixes: self.entity_prefixes.clone(),
            id_param: self.id_param.clone(),
            list_prefixes: self.list_prefixes.clone(),
        }
    }
}

fn default_id_param() -> String {
    "id".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
upstream:
  base_url: "https://tracker.example.com"
cache:
  remote_timeout_ms: 100
endpoints:
  - id: issues.get
    method: GET
    templates:
      client: "/api/issues/{id}"
      upstream: "/rest/v2/issues/{id}"
    path_params: [id]
    cache:
      ttl_seconds: 60
  - id: issues.set_status
    method: POST
    templates:
      upstream: "/rest/v2/issues/{id}/status"
    path_params: [id]
    invalidates:
      kind: issue
invalidation:
  - kind: issue
    entity_prefixes: [issues.get]
    list_prefixes: [issues.list]
"#;

    #[test]
    fn loads_yaml_with_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("gateway.yaml", SAMPLE)?;
            jail.set_env("TRACKGW_CACHE__REMOTE_TIMEOUT_MS", "40");

            let config = GatewayConfig::load(Path::new("gateway.yaml")).unwrap();
            assert_eq!(config.upstream.base_url, "https://tracker.example.com");
            assert_eq!(config.cache.remote_timeout(), Duration::from_millis(40));
            assert_eq!(config.bulk.max_in_flight, 8);
            Ok(())
        });
    }

    #[test]
    fn builds_registry_from_config() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("gateway.yaml", SAMPLE)?;
            let config = GatewayConfig::load(Path::new("gateway.yaml")).unwrap();

            let registry = config.build_registry().unwrap();
            assert_eq!(registry.len(), 2);
            let descriptor = registry.get("issues.get").unwrap();
            assert_eq!(
                descriptor.cache.unwrap().ttl,
                Duration::from_secs(60)
            );
            let binding = registry
                .get("issues.set_status")
                .unwrap()
                .invalidates
                .clone()
                .unwrap();
            assert_eq!(binding.kind, "issue");
            assert_eq!(binding.id_param, "id");
            Ok(())
        });
    }

    #[test]
    fn undeclared_placeholder_fails_at_load() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "gateway.yaml",
                r#"
endpoints:
  - id: issues.get
    method: GET
    templates:
      upstream: "/rest/v2/issues/{id}"
"#,
            )?;
            let config = GatewayConfig::load(Path::new("gateway.yaml")).unwrap();
            let err = config.build_registry().unwrap_err();
            assert!(matches!(err, ConfigError::Registry(_)));
            Ok(())
        });
    }

    #[test]
    fn malformed_template_fails_at_load() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "gateway.yaml",
                r#"
endpoints:
  - id: issues.get
    method: GET
    templates:
      upstream: "/rest/v2/issues/{id"
    path_params: [id]
"#,
            )?;
            let config = GatewayConfig::load(Path::new("gateway.yaml")).unwrap();
            let err = config.build_registry().unwrap_err();
            assert!(matches!(err, ConfigError::MalformedTemplate { .. }));
            Ok(())
        });
    }

    #[test]
    fn unknown_field_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "gateway.yaml",
                r#"
endpoints: []
surprise: true
"#,
            )?;
            assert!(GatewayConfig::load(Path::new("gateway.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn duplicate_invalidation_kind_is_rejected() {
        let config = GatewayConfig {
            upstream: UpstreamSettings::default(),
            cache: CacheSettings::default(),
            bulk: BulkSettings::default(),
            endpoints: vec![],
            invalidation: vec![
                InvalidationRuleConfig {
                    kind: "issue".into(),
                    entity_prefixes: vec![],
                    id_param: "id".into(),
                    list_prefixes: vec![],
                },
                InvalidationRuleConfig {
                    kind: "issue".into(),
                    entity_prefixes: vec![],
                    id_param: "id".into(),
                    list_prefixes: vec![],
                },
            ],
        };
        assert!(matches!(
            config.invalidation_rules().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn uncacheable_policy_yields_no_cache() {
        let policy = CachePolicyConfig {
            ttl_seconds: 60,
            cacheable: false,
        };
        assert!(policy.to_policy().is_none());
    }
}
