//! Storage contract for approval requests.
//!
//! The ledger records requests and their outcomes and nothing else. It does
//! not enforce the one-pending-request-per-entity rule; `EntityGate` does that
//! before calling `create`.

use async_trait::async_trait;

use crate::domain::approval::{
    ApprovalFilter, ApprovalId, ApprovalRequest, ApprovalStatus, NewApprovalRequest,
};
use crate::domain::entity::EntityKind;
use crate::errors::WorkflowError;

#[async_trait]
pub trait ApprovalLedger: Send + Sync {
    /// Inserts a new `pending` request with a fresh id and request time.
    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest, WorkflowError>;

    async fn get(&self, id: &ApprovalId) -> Result<Option<ApprovalRequest>, WorkflowError>;

    /// Records the outcome of a pending request.
    ///
    /// Fails with `NotFound` for an unknown id and `InvalidState` when the
    /// stored request has already been decided.
    async fn decide(
        &self,
        id: &ApprovalId,
        status: ApprovalStatus,
        approver_id: &str,
        comments: Option<&str>,
    ) -> Result<ApprovalRequest, WorkflowError>;

    /// Most recent first.
    async fn list_by_filter(
        &self,
        filter: &ApprovalFilter,
    ) -> Result<Vec<ApprovalRequest>, WorkflowError>;

    /// Full decision history for one entity, most recent first.
    async fn list_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<ApprovalRequest>, WorkflowError>;
}

pub(crate) fn approval_not_found(id: &ApprovalId) -> WorkflowError {
    WorkflowError::NotFound(format!("approval request `{id}`"))
}
