// REST DTOs for the gateway API.
//
// These types own serde and schema annotations and convert to/from internal
// domain types at the service boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::model::{BulkOpKind, BulkOperation, BulkReport, ItemOutcome};

// ---------------------------------------------------------------------------
// Bulk request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Status,
    Assign,
    Tag,
}

impl From<OperationKind> for BulkOpKind {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Status => Self::Status,
            OperationKind::Assign => Self::Assign,
            OperationKind::Tag => Self::Tag,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BulkOperationRequest {
    pub target_id: String,
    pub op: OperationKind,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

impl From<BulkOperationRequest> for BulkOperation {
    fn from(req: BulkOperationRequest) -> Self {
        Self {
            target_id: req.target_id,
            kind: req.op.into(),
            payload: req.data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BulkRequest {
    pub operations: Vec<BulkOperationRequest>,
}

// ---------------------------------------------------------------------------
// Bulk response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BulkItemSuccess {
    pub target_id: String,
    #[schema(value_type = Object)]
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BulkItemError {
    pub target_id: String,
    pub error: String,
}

/// Bulk outcome with successes and failures reported as two separate lists.
/// This separation is part of the observable contract; both lists preserve
/// submission order.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BulkResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemSuccess>,
    pub errors: Vec<BulkItemError>,
}

impl From<BulkReport> for BulkResponse {
    fn from(report: BulkReport) -> Self {
        let mut results = Vec::with_capacity(report.succeeded);
        let mut errors = Vec::with_capacity(report.failed);
        for item in report.items {
            match item.outcome {
                ItemOutcome::Succeeded(value) => results.push(BulkItemSuccess {
                    target_id: item.target_id,
                    value,
                }),
                ItemOutcome::Failed(error) => errors.push(BulkItemError {
                    target_id: item.target_id,
                    error,
                }),
            }
        }
        Self {
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed,
            results,
            errors,
        }
    }
}
