pub mod bulk;
pub mod gateway;

pub use bulk::BulkCoordinator;
pub use gateway::GatewayService;

use serde_json::Value;

use crate::domain::error::UpstreamError;
use crate::domain::model::{HttpMethod, ResolvedPath};

/// Single-item handler for the upstream tracker API. This is the seam to
/// the HTTP transport: the gateway depends only on the typed failure
/// taxonomy, never on transport detail.
#[async_trait::async_trait]
pub trait UpstreamHandler: Send + Sync {
    /// Execute one upstream call.
    ///
    /// # Errors
    ///
    /// One of the [`UpstreamError`] variants; the caller decides whether to
    /// surface it verbatim (single calls) or capture it per item (bulk).
    async fn execute(
        &self,
        path: &ResolvedPath,
        method: HttpMethod,
        payload: Option<&Value>,
    ) -> Result<Value, UpstreamError>;
}
