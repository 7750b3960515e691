use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::error::{GatewayError, ResolveError};
use crate::domain::model::{
    BulkOpKind, BulkOperation, BulkReport, ItemOutcome, ItemResult,
};
use crate::domain::registry::EndpointRegistry;

use super::gateway::GatewayService;

/// Outcome message for items a cancelled batch never finished.
const CANCELLED_MESSAGE: &str = "batch cancelled before completion";

/// Parameter every bulk endpoint binds its target id to.
const TARGET_ID_PARAM: &str = "id";

/// Endpoint ids the coordinator dispatches each operation kind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkEndpoints {
    pub status: String,
    pub assign: String,
    pub tag: String,
}

impl BulkEndpoints {
    #[must_use]
    pub fn endpoint_for(&self, kind: BulkOpKind) -> &str {
        match kind {
            BulkOpKind::Status => &self.status,
            BulkOpKind::Assign => &self.assign,
            BulkOpKind::Tag => &self.tag,
        }
    }
}

/// Fans a batch of independent mutations out through the single-item
/// mutation path with bounded parallelism.
///
/// Every item's outcome lands in a slot addressed by its input index, so
/// the report preserves submission order no matter the completion order.
/// One item's failure never aborts its siblings.
pub struct BulkCoordinator {
    gateway: Arc<GatewayService>,
    endpoints: BulkEndpoints,
    max_in_flight: usize,
    item_timeout: Duration,
}

impl BulkCoordinator {
    /// # Errors
    ///
    /// `UnknownEndpoint` if any configured bulk endpoint id is missing from
    /// the registry; this is a startup error, not a request-time one.
    pub fn new(
        gateway: Arc<GatewayService>,
        registry: &EndpointRegistry,
        endpoints: BulkEndpoints,
        max_in_flight: usize,
        item_timeout: Duration,
    ) -> Result<Self, ResolveError> {
        for id in [&endpoints.status, &endpoints.assign, &endpoints.tag] {
            registry.get(id)?;
        }
        Ok(Self {
            gateway,
            endpoints,
            max_in_flight,
            item_timeout,
        })
    }

    /// Execute a batch. Per-item errors are captured in the report, never
    /// thrown; `cancel` stops the batch cooperatively, with unfinished
    /// items reported as failed.
    ///
    /// # Errors
    ///
    /// `BatchDispatch` when no work can be scheduled at all.
    pub async fn execute(
        &self,
        operations: Vec<BulkOperation>,
        cancel: &CancellationToken,
    ) -> Result<BulkReport, GatewayError> {
        if self.max_in_flight == 0 {
            return Err(GatewayError::batch_dispatch("worker pool size is zero"));
        }
        let total = operations.len();
        debug!(total, max_in_flight = self.max_in_flight, "dispatching bulk batch");

        let target_ids: Vec<String> = operations.iter().map(|op| op.target_id.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut workers: JoinSet<(usize, ItemOutcome)> = JoinSet::new();

        for (index, op) in operations.into_iter().enumerate() {
            let gateway = Arc::clone(&self.gateway);
            let endpoint = self.endpoints.endpoint_for(op.kind).to_owned();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let item_timeout = self.item_timeout;
            workers.spawn(async move {
                let outcome = tokio::select! {
                    () = cancel.cancelled() => ItemOutcome::Failed(CANCELLED_MESSAGE.into()),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(_permit) => {
                            run_item(&gateway, &endpoint, &op, item_timeout, &cancel).await
                        }
                        Err(_) => ItemOutcome::Failed("worker pool closed".into()),
                    },
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<ItemOutcome>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                // A panicked worker loses its index; the slot sweep below
                // records the failure.
                Err(err) => warn!(error = %err, "bulk worker task failed"),
            }
        }

        let items = slots
            .into_iter()
            .zip(target_ids)
            .map(|(slot, target_id)| ItemResult {
                target_id,
                outcome: slot
                    .unwrap_or_else(|| ItemOutcome::Failed("bulk worker task failed".into())),
            })
            .collect();
        Ok(BulkReport::from_items(items))
    }
}

async fn run_item(
    gateway: &GatewayService,
    endpoint: &str,
    op: &BulkOperation,
    item_timeout: Duration,
    cancel: &CancellationToken,
) -> ItemOutcome {
    let params = HashMap::from([(TARGET_ID_PARAM.to_owned(), op.target_id.clone())]);
    let mutation = gateway.mutate(endpoint, &params, &op.payload);
    tokio::select! {
        () = cancel.cancelled() => ItemOutcome::Failed(CANCELLED_MESSAGE.into()),
        result = tokio::time::timeout(item_timeout, mutation) => match result {
            Err(_) => ItemOutcome::Failed(format!(
                "operation timed out after {}s",
                item_timeout.as_secs()
            )),
            Ok(Ok(value)) => ItemOutcome::Succeeded(value),
            Ok(Err(err)) => ItemOutcome::Failed(err.to_string()),
        },
    }
}
