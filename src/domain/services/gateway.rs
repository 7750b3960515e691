use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::domain::error::{GatewayError, UpstreamError};
use crate::domain::model::{CacheStatus, FetchOutcome};
use crate::domain::registry::EndpointRegistry;
use crate::domain::resolver::PathResolver;
use crate::infra::cache::invalidation::InvalidationManager;
use crate::infra::cache::{CacheFacade, key};

use super::UpstreamHandler;

/// Read/mutate orchestration over the registry, resolver, cache facade and
/// upstream handler. One instance serves all requests.
pub struct GatewayService {
    registry: Arc<EndpointRegistry>,
    resolver: PathResolver,
    cache: Arc<CacheFacade>,
    invalidation: Arc<InvalidationManager>,
    handler: Arc<dyn UpstreamHandler>,
    /// Surface resolved for upstream calls.
    surface: String,
}

impl GatewayService {
    #[must_use]
    pub fn new(
        registry: Arc<EndpointRegistry>,
        cache: Arc<CacheFacade>,
        invalidation: Arc<InvalidationManager>,
        handler: Arc<dyn UpstreamHandler>,
        surface: String,
    ) -> Self {
        Self {
            resolver: PathResolver::new(Arc::clone(&registry)),
            registry,
            cache,
            invalidation,
            handler,
            surface,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Read an endpoint, consulting the cache per its policy.
    ///
    /// `bypass` skips the cache read but refreshes the stored value.
    /// Uncacheable endpoints always go upstream and report `BYPASS`.
    ///
    /// # Errors
    ///
    /// Resolution errors, or the upstream handler's typed failure verbatim.
    pub async fn fetch(
        &self,
        endpoint_id: &str,
        params: &HashMap<String, String>,
        bypass: bool,
    ) -> Result<FetchOutcome, GatewayError> {
        let descriptor = self.registry.get(endpoint_id)?;
        if descriptor.method.is_mutation() {
            return Err(UpstreamError::Validation {
                detail: format!("endpoint '{endpoint_id}' is a mutation; use the mutate path"),
            }
            .into());
        }
        let resolved = self.resolver.resolve_with(descriptor, &self.surface, params)?;

        let Some(policy) = descriptor.cache else {
            let value = self.handler.execute(&resolved, descriptor.method, None).await?;
            return Ok(FetchOutcome {
                value,
                cache: CacheStatus::Bypass,
                ttl_remaining: Duration::ZERO,
            });
        };

        let cache_key = key::cache_key(&descriptor.id, &resolved.consumed);
        let cached = self
            .cache
            .get_or_compute(&cache_key, policy.ttl, bypass, || async {
                let value = self
                    .handler
                    .execute(&resolved, descriptor.method, None)
                    .await?;
                serde_json::to_vec(&value)
                    .map(Bytes::from)
                    .map_err(|e| GatewayError::internal(format!("serializing cache value: {e}")))
            })
            .await?;

        let value = serde_json::from_slice(&cached.value)
            .map_err(|e| GatewayError::internal(format!("corrupt cache entry '{cache_key}': {e}")))?;
        Ok(FetchOutcome {
            value,
            cache: cached.status,
            ttl_remaining: cached.ttl_remaining,
        })
    }

    /// Execute a mutation, then sweep dependent cache entries.
    ///
    /// Invalidation runs after the upstream call succeeded and can never
    /// fail the mutation.
    ///
    /// # Errors
    ///
    /// Resolution errors, or the upstream handler's typed failure verbatim.
    pub async fn mutate(
        &self,
        endpoint_id: &str,
        params: &HashMap<String, String>,
        payload: &Value,
    ) -> Result<Value, GatewayError> {
        let descriptor = self.registry.get(endpoint_id)?;
        if !descriptor.method.is_mutation() {
            return Err(UpstreamError::Validation {
                detail: format!("endpoint '{endpoint_id}' is a read; use the fetch path"),
            }
            .into());
        }
        let resolved = self.resolver.resolve_with(descriptor, &self.surface, params)?;

        let value = self
            .handler
            .execute(&resolved, descriptor.method, Some(payload))
            .await?;

        if let Some(binding) = &descriptor.invalidates {
            match params.get(&binding.id_param) {
                Some(id) => self.invalidation.invalidate(&binding.kind, id).await,
                None => debug!(
                    endpoint = %descriptor.id,
                    param = %binding.id_param,
                    "invalidation id parameter absent; skipping sweep"
                ),
            }
        }

        Ok(value)
    }
}
