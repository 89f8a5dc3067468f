//! The approval/lock state machine.
//!
//! Per entity: `draft -> pending -> approved | rejected`. A rejected (or
//! draft) entity may be requested again; an approved one may not. Approval
//! locks the entity; `unlock_entity` clears the lock but keeps the
//! `approved` status so the decision history stays visible on the record.
//!
//! Every transition holds the entity's slot in `EntityLocks` for the whole
//! read-check-write sequence, which is what keeps at most one request
//! pending per entity under concurrent callers.

pub mod accessor;
pub mod locks;
pub mod policy;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use crate::domain::approval::{
    ApprovalFilter, ApprovalId, ApprovalRequest, ApprovalStatus, NewApprovalRequest,
};
use crate::domain::entity::{EntityApprovalStatus, EntityKind, EntityPatch, EntityView};
use crate::errors::WorkflowError;
use crate::ledger::{approval_not_found, ApprovalLedger};

pub use accessor::{AccessorRegistry, EntityAccessor};
pub use locks::EntityLocks;

use accessor::entity_not_found;

pub const DEFAULT_APPROVAL_LEVEL: u32 = 1;

const SYSTEM_ACTOR: &str = "system";
const WITHDRAWN_COMMENT: &str = "withdrawn: the target entity could not be updated";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestApproval {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub tenant_id: Option<String>,
    pub requester_id: String,
    pub approver_id: Option<String>,
    pub level: Option<u32>,
    pub comments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub approver_id: String,
    pub comments: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct UnlockOutcome {
    pub success: bool,
}

pub struct EntityGate {
    ledger: Arc<dyn ApprovalLedger>,
    accessors: AccessorRegistry,
    locks: EntityLocks,
    audit: Arc<dyn AuditSink>,
}

impl EntityGate {
    pub fn new(ledger: Arc<dyn ApprovalLedger>, accessors: AccessorRegistry) -> Self {
        Self { ledger, accessors, locks: EntityLocks::new(), audit: Arc::new(NoopAuditSink) }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn supported_kinds(&self) -> Vec<EntityKind> {
        self.accessors.kinds()
    }

    /// Opens a new approval cycle for an entity in `draft`, `rejected` or an
    /// unrecognised status.
    pub async fn request_approval(
        &self,
        command: RequestApproval,
    ) -> Result<ApprovalRequest, WorkflowError> {
        let kind = command.entity_kind;
        let accessor = self.accessors.resolve(kind)?;
        require_actor("requester id", &command.requester_id)?;

        let level = command.level.unwrap_or(DEFAULT_APPROVAL_LEVEL);
        if level == 0 {
            return Err(self.refuse(
                kind,
                &command.entity_id,
                &command.requester_id,
                None,
                WorkflowError::InvalidState("approval level must be a positive integer".into()),
            ));
        }

        let _guard = self.locks.acquire(kind, &command.entity_id).await;

        let entity = load_entity(accessor.as_ref(), kind, &command.entity_id).await?;
        ensure_same_tenant(&entity, command.tenant_id.as_deref())?;
        if let Err(error) = policy::ensure_requestable(&entity) {
            return Err(self.refuse(kind, &entity.id, &command.requester_id, None, error));
        }

        self.withdraw_orphans(&entity).await?;

        let tenant_id = command.tenant_id.or_else(|| entity.tenant_id.clone());
        let request = self
            .ledger
            .create(NewApprovalRequest {
                entity_kind: kind,
                entity_id: entity.id.clone(),
                tenant_id,
                requester_id: command.requester_id,
                approver_id: command.approver_id,
                level,
                comments: command.comments,
            })
            .await?;

        let patch = EntityPatch::status(EntityApprovalStatus::Pending, request.id.clone());
        if let Err(error) = accessor.update(&entity.id, patch).await {
            // Leaving the request pending would block every later request
            // for this entity.
            if let Err(withdrawal_error) = self
                .ledger
                .decide(
                    &request.id,
                    ApprovalStatus::Rejected,
                    SYSTEM_ACTOR,
                    Some(WITHDRAWN_COMMENT),
                )
                .await
            {
                return Err(self.compensation_failed(
                    &entity,
                    &request.id,
                    "withdrawal",
                    error,
                    withdrawal_error,
                ));
            }
            return Err(error);
        }

        self.audit.emit(
            AuditEvent::new(
                "approval.requested",
                kind,
                &entity.id,
                &request.requester_id,
                AuditOutcome::Success,
            )
            .with_approval(&request.id)
            .with_metadata("from", entity.approval_status.as_str())
            .with_metadata("to", EntityApprovalStatus::Pending.as_str())
            .with_metadata("level", level.to_string()),
        );

        Ok(request)
    }

    /// Approves a pending request and locks its entity.
    pub async fn approve(
        &self,
        approval_id: &ApprovalId,
        decision: Decision,
    ) -> Result<ApprovalRequest, WorkflowError> {
        self.decide(approval_id, ApprovalStatus::Approved, decision).await
    }

    /// Rejects a pending request. The entity's lock fields are not touched.
    pub async fn reject(
        &self,
        approval_id: &ApprovalId,
        decision: Decision,
    ) -> Result<ApprovalRequest, WorkflowError> {
        self.decide(approval_id, ApprovalStatus::Rejected, decision).await
    }

    async fn decide(
        &self,
        approval_id: &ApprovalId,
        outcome: ApprovalStatus,
        decision: Decision,
    ) -> Result<ApprovalRequest, WorkflowError> {
        require_actor("approver id", &decision.approver_id)?;

        let located = self.load_request(approval_id).await?;
        let kind = located.entity_kind;
        let accessor = self.accessors.resolve(kind)?;

        let _guard = self.locks.acquire(kind, &located.entity_id).await;

        // Re-read under the entity lock; a concurrent decision may have landed.
        let request = self.load_request(approval_id).await?;
        if request.status.is_terminal() {
            let error = WorkflowError::InvalidState(format!(
                "approval request `{approval_id}` is already {}",
                request.status
            ));
            return Err(self.refuse(
                kind,
                &request.entity_id,
                &decision.approver_id,
                Some(approval_id),
                error,
            ));
        }
        let entity = load_entity(accessor.as_ref(), kind, &request.entity_id).await?;

        // Entity first: a failed write leaves the request pending, so the
        // decision can simply be retried.
        let mut patch = EntityPatch::status(outcome.into(), approval_id.clone());
        if outcome == ApprovalStatus::Approved {
            patch = patch.with_lock(Utc::now(), decision.approver_id.clone());
        }
        accessor.update(&entity.id, patch).await?;

        let decided = match self
            .ledger
            .decide(approval_id, outcome, &decision.approver_id, decision.comments.as_deref())
            .await
        {
            Ok(decided) => decided,
            Err(error) => {
                if let Err(rollback_error) =
                    accessor.update(&entity.id, EntityPatch::restore(&entity)).await
                {
                    return Err(self.compensation_failed(
                        &entity,
                        approval_id,
                        "rollback",
                        error,
                        rollback_error,
                    ));
                }
                return Err(error);
            }
        };

        let event_type = match outcome {
            ApprovalStatus::Approved => "approval.approved",
            _ => "approval.rejected",
        };
        self.audit.emit(
            AuditEvent::new(
                event_type,
                kind,
                &decided.entity_id,
                &decision.approver_id,
                AuditOutcome::Success,
            )
            .with_approval(approval_id)
            .with_metadata("from", ApprovalStatus::Pending.as_str())
            .with_metadata("to", outcome.as_str()),
        );

        Ok(decided)
    }

    /// Clears the lock fields of an entity whatever its approval status.
    /// Authorising `user_id` is the caller's responsibility.
    pub async fn unlock_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
        user_id: &str,
    ) -> Result<UnlockOutcome, WorkflowError> {
        let accessor = self.accessors.resolve(kind)?;
        let _guard = self.locks.acquire(kind, entity_id).await;

        let entity = accessor.update(entity_id, EntityPatch::unlock()).await?;

        let mut event =
            AuditEvent::new("entity.unlocked", kind, entity_id, user_id, AuditOutcome::Success)
                .with_metadata("approval_status", entity.approval_status.as_str());
        if let Some(approval_id) = &entity.approval_id {
            event = event.with_approval(approval_id);
        }
        self.audit.emit(event);

        Ok(UnlockOutcome { success: true })
    }

    /// `false` for an unknown entity; see `policy::can_edit` for the rules.
    pub async fn can_edit(
        &self,
        kind: EntityKind,
        entity_id: &str,
        user_id: &str,
    ) -> Result<bool, WorkflowError> {
        let accessor = self.accessors.resolve(kind)?;
        Ok(accessor
            .get(entity_id)
            .await?
            .map(|entity| policy::can_edit(&entity, user_id))
            .unwrap_or(false))
    }

    pub async fn pending_approvals(
        &self,
        filter: &ApprovalFilter,
    ) -> Result<Vec<ApprovalRequest>, WorkflowError> {
        self.ledger.list_by_filter(filter).await
    }

    pub async fn entity_approval_history(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<ApprovalRequest>, WorkflowError> {
        self.ledger.list_by_entity(kind, entity_id).await
    }

    async fn load_request(&self, id: &ApprovalId) -> Result<ApprovalRequest, WorkflowError> {
        self.ledger.get(id).await?.ok_or_else(|| approval_not_found(id))
    }

    /// Withdraws pending requests the entity no longer points at. They are
    /// left behind only when an earlier withdrawal itself failed.
    async fn withdraw_orphans(&self, entity: &EntityView) -> Result<(), WorkflowError> {
        let history = self.ledger.list_by_entity(entity.kind, &entity.id).await?;
        for orphan in history.iter().filter(|request| request.status == ApprovalStatus::Pending) {
            self.ledger
                .decide(&orphan.id, ApprovalStatus::Rejected, SYSTEM_ACTOR, Some(WITHDRAWN_COMMENT))
                .await?;
            self.audit.emit(
                AuditEvent::new(
                    "approval.withdrawn",
                    entity.kind,
                    &entity.id,
                    SYSTEM_ACTOR,
                    AuditOutcome::Success,
                )
                .with_approval(&orphan.id),
            );
        }
        Ok(())
    }

    /// Records that undoing a half-applied transition failed and folds both
    /// errors into one storage error.
    fn compensation_failed(
        &self,
        entity: &EntityView,
        approval_id: &ApprovalId,
        step: &str,
        error: WorkflowError,
        compensation_error: WorkflowError,
    ) -> WorkflowError {
        self.audit.emit(
            AuditEvent::new(
                "approval.compensation_failed",
                entity.kind,
                &entity.id,
                SYSTEM_ACTOR,
                AuditOutcome::Failed,
            )
            .with_approval(approval_id)
            .with_metadata("step", step)
            .with_metadata("error", error.to_string())
            .with_metadata("compensation_error", compensation_error.to_string()),
        );
        WorkflowError::Storage(format!("{error}; {step} failed: {compensation_error}"))
    }

    fn refuse(
        &self,
        kind: EntityKind,
        entity_id: &str,
        actor: &str,
        approval_id: Option<&ApprovalId>,
        error: WorkflowError,
    ) -> WorkflowError {
        let mut event = AuditEvent::new(
            "approval.transition_refused",
            kind,
            entity_id,
            actor,
            AuditOutcome::Rejected,
        )
        .with_metadata("error", error.to_string());
        if let Some(approval_id) = approval_id {
            event = event.with_approval(approval_id);
        }
        self.audit.emit(event);
        error
    }
}

async fn load_entity(
    accessor: &dyn EntityAccessor,
    kind: EntityKind,
    entity_id: &str,
) -> Result<EntityView, WorkflowError> {
    accessor.get(entity_id).await?.ok_or_else(|| entity_not_found(kind, entity_id))
}

/// An entity owned by another tenant is reported as absent.
fn ensure_same_tenant(entity: &EntityView, tenant_id: Option<&str>) -> Result<(), WorkflowError> {
    match (entity.tenant_id.as_deref(), tenant_id) {
        (Some(owner), Some(caller)) if owner != caller => {
            Err(entity_not_found(entity.kind, &entity.id))
        }
        _ => Ok(()),
    }
}

fn require_actor(field: &str, value: &str) -> Result<(), WorkflowError> {
    if value.trim().is_empty() {
        return Err(WorkflowError::InvalidState(format!("{field} is required")));
    }
    Ok(())
}
