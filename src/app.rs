use std::sync::Arc;

use axum::Router;

use crate::api::rest;
use crate::config::{ConfigError, GatewayConfig};
use crate::domain::services::bulk::BulkCoordinator;
use crate::domain::services::gateway::GatewayService;
use crate::domain::services::UpstreamHandler;
use crate::infra::cache::CacheFacade;
use crate::infra::cache::invalidation::InvalidationManager;
use crate::infra::cache::memory::MemoryStore;
use crate::infra::cache::store::CacheStore;
use crate::infra::clock::{Clock, SystemClock};
use crate::infra::upstream::HttpUpstreamHandler;

/// Shared handler state for the REST layer.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayService>,
    pub bulk: Arc<BulkCoordinator>,
    pub cache: Arc<CacheFacade>,
}

/// Composition root: wires configuration into the component graph.
pub struct TrackerGateway {
    state: AppState,
}

impl TrackerGateway {
    /// Build with the production reqwest upstream handler and system clock.
    /// The remote cache store is an external collaborator and is injected.
    ///
    /// # Errors
    ///
    /// Configuration validation failures or an unbuildable HTTP client.
    pub fn from_config(
        config: &GatewayConfig,
        remote_store: Arc<dyn CacheStore>,
    ) -> anyhow::Result<Self> {
        let handler = HttpUpstreamHandler::new(
            &config.upstream.base_url,
            config.upstream.request_timeout(),
        )?;
        Ok(Self::with_parts(
            config,
            remote_store,
            Arc::new(handler),
            Arc::new(SystemClock),
        )?)
    }

    /// Build with injected collaborators (tests, custom transports).
    ///
    /// # Errors
    ///
    /// Configuration validation failures.
    pub fn with_parts(
        config: &GatewayConfig,
        remote_store: Arc<dyn CacheStore>,
        handler: Arc<dyn UpstreamHandler>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let registry = Arc::new(config.build_registry()?);
        let local = Arc::new(MemoryStore::new(Arc::clone(&clock)));
        let cache = Arc::new(CacheFacade::new(
            remote_store,
            local,
            config.cache.remote_timeout(),
            clock,
        ));
        let invalidation = Arc::new(InvalidationManager::new(
            Arc::clone(&cache),
            config.invalidation_rules()?,
            config.cache.invalidation_retry(),
        ));
        let gateway = Arc::new(GatewayService::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            invalidation,
            handler,
            config.upstream.surface.clone(),
        ));
        let bulk = BulkCoordinator::new(
            Arc::clone(&gateway),
            &registry,
            config.bulk.endpoints(),
            config.bulk.max_in_flight,
            config.bulk.item_timeout(),
        )
        .map_err(|err| ConfigError::Invalid {
            detail: format!("bulk endpoint configuration: {err}"),
        })?;

        Ok(Self {
            state: AppState {
                gateway,
                bulk: Arc::new(bulk),
                cache,
            },
        })
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<GatewayService> {
        &self.state.gateway
    }

    #[must_use]
    pub fn bulk(&self) -> &Arc<BulkCoordinator> {
        &self.state.bulk
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheFacade> {
        &self.state.cache
    }

    #[must_use]
    pub fn router(&self) -> Router {
        rest::routes::router(self.state.clone())
    }
}
