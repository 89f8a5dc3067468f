use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalId, ApprovalStatus};
use crate::errors::WorkflowError;

/// Approvable document types. The gate never branches on this beyond picking
/// the accessor registered for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[serde(alias = "purchaseOrder", alias = "PurchaseOrder")]
    PurchaseOrder,
    #[serde(alias = "saleOrder", alias = "SaleOrder")]
    SaleOrder,
    #[serde(alias = "Production")]
    Production,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::PurchaseOrder, Self::SaleOrder, Self::Production];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PurchaseOrder => "purchase_order",
            Self::SaleOrder => "sale_order",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = WorkflowError;

    /// Accepts snake_case, kebab-case, camelCase and upper-case spellings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key: String = value
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "purchaseorder" => Ok(Self::PurchaseOrder),
            "saleorder" => Ok(Self::SaleOrder),
            "production" => Ok(Self::Production),
            _ => Err(WorkflowError::InvalidState(format!("unsupported entity kind `{value}`"))),
        }
    }
}

/// Mirror of the latest approval outcome as stored on the entity itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityApprovalStatus {
    #[default]
    Draft,
    Pending,
    Approved,
    Rejected,
    /// Any stored value the workflow does not recognise.
    Other(String),
}

impl EntityApprovalStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Other(value) => value,
        }
    }

    /// A missing or blank column reads as `Draft`.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Draft,
            Some(value) => Self::from(value.to_string()),
        }
    }
}

impl From<String> for EntityApprovalStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "draft" => Self::Draft,
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Other(value),
        }
    }
}

impl From<EntityApprovalStatus> for String {
    fn from(value: EntityApprovalStatus) -> Self {
        value.as_str().to_string()
    }
}

impl From<ApprovalStatus> for EntityApprovalStatus {
    fn from(value: ApprovalStatus) -> Self {
        match value {
            ApprovalStatus::Pending => Self::Pending,
            ApprovalStatus::Approved => Self::Approved,
            ApprovalStatus::Rejected => Self::Rejected,
        }
    }
}

impl fmt::Display for EntityApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The slice of an approvable entity the workflow reads. Everything else
/// about the document stays with its accessor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub kind: EntityKind,
    pub id: String,
    pub tenant_id: Option<String>,
    pub approval_status: EntityApprovalStatus,
    pub approval_id: Option<ApprovalId>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub user_id: Option<String>,
    pub requester_id: Option<String>,
}

impl EntityView {
    pub fn draft(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            tenant_id: None,
            approval_status: EntityApprovalStatus::Draft,
            approval_id: None,
            locked_at: None,
            locked_by: None,
            user_id: None,
            requester_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_requester(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    pub fn is_created_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id) || self.requester_id.as_deref() == Some(user_id)
    }

    pub fn apply(&mut self, patch: &EntityPatch) {
        if let Some(status) = &patch.approval_status {
            self.approval_status = status.clone();
        }
        if let Some(approval_id) = &patch.approval_id {
            self.approval_id = Some(approval_id.clone());
        }
        match &patch.lock {
            Some(LockChange::Set { at, by }) => {
                self.locked_at = Some(*at);
                self.locked_by = Some(by.clone());
            }
            Some(LockChange::Clear) => {
                self.locked_at = None;
                self.locked_by = None;
            }
            None => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockChange {
    Set { at: DateTime<Utc>, by: String },
    Clear,
}

/// Partial write against the workflow fields of an entity. `None` leaves a
/// field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityPatch {
    pub approval_status: Option<EntityApprovalStatus>,
    pub approval_id: Option<ApprovalId>,
    pub lock: Option<LockChange>,
}

impl EntityPatch {
    pub fn status(status: EntityApprovalStatus, approval_id: ApprovalId) -> Self {
        Self { approval_status: Some(status), approval_id: Some(approval_id), lock: None }
    }

    pub fn with_lock(mut self, at: DateTime<Utc>, by: impl Into<String>) -> Self {
        self.lock = Some(LockChange::Set { at, by: by.into() });
        self
    }

    pub fn unlock() -> Self {
        Self { lock: Some(LockChange::Clear), ..Self::default() }
    }

    /// Writes back the workflow fields of `entity` as they were read.
    pub fn restore(entity: &EntityView) -> Self {
        let lock = match (entity.locked_at, &entity.locked_by) {
            (Some(at), Some(by)) => LockChange::Set { at, by: by.clone() },
            _ => LockChange::Clear,
        };
        Self {
            approval_status: Some(entity.approval_status.clone()),
            approval_id: entity.approval_id.clone(),
            lock: Some(lock),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.approval_status.is_none() && self.approval_id.is_none() && self.lock.is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{EntityApprovalStatus, EntityKind, EntityPatch, EntityView};
    use crate::domain::approval::ApprovalId;

    #[test]
    fn entity_kind_accepts_common_spellings() {
        for raw in ["purchase_order", "purchaseOrder", "PURCHASE-ORDER", " PurchaseOrder "] {
            assert_eq!(raw.parse::<EntityKind>().expect(raw), EntityKind::PurchaseOrder);
        }
        assert_eq!("sale-order".parse::<EntityKind>().expect("sale"), EntityKind::SaleOrder);
        assert!("invoice".parse::<EntityKind>().is_err());
    }

    #[test]
    fn entity_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EntityKind::SaleOrder).expect("serialize");
        assert_eq!(json, "\"sale_order\"");
        let parsed: EntityKind = serde_json::from_str("\"purchaseOrder\"").expect("deserialize");
        assert_eq!(parsed, EntityKind::PurchaseOrder);
    }

    #[test]
    fn stored_status_defaults_to_draft_and_keeps_unknown_values() {
        assert_eq!(EntityApprovalStatus::from_stored(None), EntityApprovalStatus::Draft);
        assert_eq!(EntityApprovalStatus::from_stored(Some(" ")), EntityApprovalStatus::Draft);
        assert_eq!(
            EntityApprovalStatus::from_stored(Some("APPROVED")),
            EntityApprovalStatus::Approved
        );
        assert_eq!(
            EntityApprovalStatus::from_stored(Some("cancelled")),
            EntityApprovalStatus::Other("cancelled".to_string())
        );
    }

    #[test]
    fn creator_match_checks_both_fields() {
        let by_user = EntityView::draft(EntityKind::SaleOrder, "SO-1").with_user("u-1");
        let by_requester = EntityView::draft(EntityKind::Production, "PR-1").with_requester("u-1");

        assert!(by_user.is_created_by("u-1"));
        assert!(by_requester.is_created_by("u-1"));
        assert!(!by_user.is_created_by("u-2"));
    }

    #[test]
    fn patch_sets_and_clears_lock_fields_only_when_asked() {
        let mut entity = EntityView::draft(EntityKind::PurchaseOrder, "PO-1");
        let approval_id = ApprovalId("APR-1".to_string());
        let now = Utc::now();

        entity.apply(
            &EntityPatch::status(EntityApprovalStatus::Approved, approval_id.clone())
                .with_lock(now, "u-2"),
        );
        assert_eq!(entity.approval_status, EntityApprovalStatus::Approved);
        assert_eq!(entity.locked_by.as_deref(), Some("u-2"));

        entity.apply(&EntityPatch::unlock());
        assert!(!entity.is_locked());
        assert!(entity.locked_by.is_none());
        assert_eq!(entity.approval_status, EntityApprovalStatus::Approved);
        assert_eq!(entity.approval_id, Some(approval_id));
    }

    #[test]
    fn restore_patch_undoes_a_decision() {
        let approval_id = ApprovalId("APR-7".to_string());
        let mut entity = EntityView::draft(EntityKind::SaleOrder, "SO-7");
        entity.apply(&EntityPatch::status(EntityApprovalStatus::Pending, approval_id.clone()));
        let before = entity.clone();

        entity.apply(
            &EntityPatch::status(EntityApprovalStatus::Approved, approval_id)
                .with_lock(Utc::now(), "u-2"),
        );
        entity.apply(&EntityPatch::restore(&before));

        assert_eq!(entity, before);
    }
}
