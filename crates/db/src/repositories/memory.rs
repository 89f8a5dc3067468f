use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use gatekeep_core::domain::approval::{
    ApprovalFilter, ApprovalId, ApprovalRequest, ApprovalStatus, NewApprovalRequest,
};
use gatekeep_core::domain::entity::{EntityKind, EntityPatch, EntityView};
use gatekeep_core::errors::WorkflowError;
use gatekeep_core::gate::EntityAccessor;
use gatekeep_core::ledger::ApprovalLedger;

/// Insertion-ordered; ties on `requested_at` resolve to the later insert.
#[derive(Default)]
pub struct InMemoryApprovalLedger {
    approvals: RwLock<Vec<ApprovalRequest>>,
}

impl InMemoryApprovalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first<'a>(
        approvals: impl DoubleEndedIterator<Item = &'a ApprovalRequest>,
        keep: impl Fn(&ApprovalRequest) -> bool,
    ) -> Vec<ApprovalRequest> {
        let mut selected: Vec<ApprovalRequest> =
            approvals.rev().filter(|approval| keep(approval)).cloned().collect();
        selected.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        selected
    }
}

#[async_trait::async_trait]
impl ApprovalLedger for InMemoryApprovalLedger {
    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest, WorkflowError> {
        let approval = request.into_pending(ApprovalId::generate(), Utc::now());
        let mut approvals = self.approvals.write().await;
        approvals.push(approval.clone());
        Ok(approval)
    }

    async fn get(&self, id: &ApprovalId) -> Result<Option<ApprovalRequest>, WorkflowError> {
        let approvals = self.approvals.read().await;
        Ok(approvals.iter().find(|approval| &approval.id == id).cloned())
    }

    async fn decide(
        &self,
        id: &ApprovalId,
        status: ApprovalStatus,
        approver_id: &str,
        comments: Option<&str>,
    ) -> Result<ApprovalRequest, WorkflowError> {
        let mut approvals = self.approvals.write().await;
        let approval = approvals
            .iter_mut()
            .find(|approval| &approval.id == id)
            .ok_or_else(|| WorkflowError::NotFound(format!("approval request `{id}`")))?;
        approval.record_decision(status, approver_id, comments, Utc::now())?;
        Ok(approval.clone())
    }

    async fn list_by_filter(
        &self,
        filter: &ApprovalFilter,
    ) -> Result<Vec<ApprovalRequest>, WorkflowError> {
        let approvals = self.approvals.read().await;
        Ok(Self::newest_first(approvals.iter(), |approval| filter.matches(approval)))
    }

    async fn list_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<ApprovalRequest>, WorkflowError> {
        let approvals = self.approvals.read().await;
        Ok(Self::newest_first(approvals.iter(), |approval| {
            approval.entity_kind == kind && approval.entity_id == entity_id
        }))
    }
}

pub struct InMemoryEntityAccessor {
    kind: EntityKind,
    entities: RwLock<HashMap<String, EntityView>>,
}

impl InMemoryEntityAccessor {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind, entities: RwLock::new(HashMap::new()) }
    }

    /// Stores `entity`, replacing any previous entity with the same id.
    pub async fn insert(&self, entity: EntityView) {
        let mut entities = self.entities.write().await;
        entities.insert(entity.id.clone(), EntityView { kind: self.kind, ..entity });
    }
}

#[async_trait::async_trait]
impl EntityAccessor for InMemoryEntityAccessor {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn get(&self, id: &str) -> Result<Option<EntityView>, WorkflowError> {
        let entities = self.entities.read().await;
        Ok(entities.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: EntityPatch) -> Result<EntityView, WorkflowError> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(id)
            .ok_or_else(|| WorkflowError::NotFound(format!("{} `{id}`", self.kind)))?;
        entity.apply(&patch);
        Ok(entity.clone())
    }
}
