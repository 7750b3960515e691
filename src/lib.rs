// === PUBLIC API ===
pub use crate::app::{AppState, TrackerGateway};
pub use crate::config::{ConfigError, GatewayConfig};
pub use crate::domain::error::{GatewayError, ResolveError, UpstreamError};
pub use crate::domain::model::{
    BulkOpKind, BulkOperation, BulkReport, CachePolicy, CacheStatus, EndpointDescriptor,
    FetchOutcome, HttpMethod, InvalidationBinding, ItemOutcome, ItemResult, PathTemplate,
    ResolvedPath,
};
pub use crate::domain::registry::{EndpointRegistry, RegistryError};
pub use crate::domain::resolver::PathResolver;
pub use crate::domain::services::bulk::BulkEndpoints;
pub use crate::domain::services::{BulkCoordinator, GatewayService, UpstreamHandler};
pub use crate::infra::cache::invalidation::{InvalidationManager, InvalidationRule};
pub use crate::infra::cache::key::cache_key;
pub use crate::infra::cache::memory::MemoryStore;
pub use crate::infra::cache::store::{CacheEntry, CacheStore, StoreError};
pub use crate::infra::cache::{CacheFacade, CachedValue};
pub use crate::infra::clock::{Clock, SystemClock};
pub use crate::infra::upstream::HttpUpstreamHandler;

// === COMPOSITION ROOT ===
pub mod app;

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
pub(crate) mod domain;
pub(crate) mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
