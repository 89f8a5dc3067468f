use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entity::EntityKind;
use crate::errors::WorkflowError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(pub String);

impl ApprovalId {
    pub fn generate() -> Self {
        Self(format!("APR-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(WorkflowError::InvalidState(format!(
                "unknown approval status `{other}` (expected pending|approved|rejected)"
            ))),
        }
    }
}

/// One ask-to-decide cycle for a single target entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub tenant_id: Option<String>,
    pub requester_id: String,
    pub approver_id: Option<String>,
    pub level: u32,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// Applies a decision in place. Comments are replaced only when a
    /// non-blank value is supplied.
    pub fn record_decision(
        &mut self,
        status: ApprovalStatus,
        approver_id: &str,
        comments: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if self.status.is_terminal() {
            return Err(WorkflowError::InvalidState(format!(
                "approval request `{}` is already {}",
                self.id, self.status
            )));
        }
        if !status.is_terminal() {
            return Err(WorkflowError::InvalidState(
                "a decision must be approved or rejected".to_string(),
            ));
        }

        self.status = status;
        self.approver_id = Some(approver_id.to_string());
        self.responded_at = Some(at);
        if let Some(comments) = non_blank(comments) {
            self.comments = Some(comments.to_string());
        }
        Ok(())
    }
}

/// Input to `ApprovalLedger::create`; the ledger assigns id, status and
/// request time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewApprovalRequest {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub tenant_id: Option<String>,
    pub requester_id: String,
    pub approver_id: Option<String>,
    pub level: u32,
    pub comments: Option<String>,
}

impl NewApprovalRequest {
    pub fn into_pending(self, id: ApprovalId, requested_at: DateTime<Utc>) -> ApprovalRequest {
        ApprovalRequest {
            id,
            entity_kind: self.entity_kind,
            entity_id: self.entity_id,
            tenant_id: self.tenant_id,
            requester_id: self.requester_id,
            approver_id: self.approver_id,
            level: self.level,
            status: ApprovalStatus::Pending,
            comments: self.comments,
            requested_at,
            responded_at: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalFilter {
    pub tenant_id: Option<String>,
    pub status: Option<ApprovalStatus>,
    pub entity_kind: Option<EntityKind>,
    pub requester_id: Option<String>,
    pub approver_id: Option<String>,
}

impl ApprovalFilter {
    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        self.tenant_id.as_ref().map_or(true, |tenant| request.tenant_id.as_ref() == Some(tenant))
            && self.status.map_or(true, |status| request.status == status)
            && self.entity_kind.map_or(true, |kind| request.entity_kind == kind)
            && self.requester_id.as_ref().map_or(true, |id| &request.requester_id == id)
            && self
                .approver_id
                .as_ref()
                .map_or(true, |id| request.approver_id.as_ref() == Some(id))
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{ApprovalFilter, ApprovalId, ApprovalStatus, NewApprovalRequest};
    use crate::domain::entity::EntityKind;
    use crate::errors::WorkflowError;

    fn pending() -> super::ApprovalRequest {
        NewApprovalRequest {
            entity_kind: EntityKind::PurchaseOrder,
            entity_id: "PO-1".to_string(),
            tenant_id: Some("tenant-a".to_string()),
            requester_id: "u-1".to_string(),
            approver_id: Some("u-2".to_string()),
            level: 1,
            comments: Some("please review".to_string()),
        }
        .into_pending(ApprovalId("APR-1".to_string()), Utc::now())
    }

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let first = ApprovalId::generate();
        let second = ApprovalId::generate();

        assert!(first.0.starts_with("APR-"));
        assert_ne!(first, second);
    }

    #[test]
    fn decision_keeps_prior_comment_when_none_supplied() {
        let mut request = pending();
        let at = Utc::now() + Duration::seconds(5);

        request.record_decision(ApprovalStatus::Approved, "u-9", Some("   "), at).expect("decide");

        assert_eq!(request.status, ApprovalStatus::Approved);
        assert_eq!(request.approver_id.as_deref(), Some("u-9"));
        assert_eq!(request.comments.as_deref(), Some("please review"));
        assert_eq!(request.responded_at, Some(at));
    }

    #[test]
    fn decision_overwrites_comment_when_supplied() {
        let mut request = pending();

        request
            .record_decision(ApprovalStatus::Rejected, "u-2", Some("missing quote"), Utc::now())
            .expect("decide");

        assert_eq!(request.comments.as_deref(), Some("missing quote"));
    }

    #[test]
    fn second_decision_is_invalid_state() {
        let mut request = pending();
        request.record_decision(ApprovalStatus::Approved, "u-2", None, Utc::now()).expect("first");

        let error = request
            .record_decision(ApprovalStatus::Rejected, "u-2", None, Utc::now())
            .expect_err("second decision must fail");

        assert!(matches!(error, WorkflowError::InvalidState(_)));
        assert_eq!(request.status, ApprovalStatus::Approved);
    }

    #[test]
    fn filter_matches_on_every_supplied_field() {
        let request = pending();

        assert!(ApprovalFilter::default().matches(&request));
        assert!(ApprovalFilter {
            tenant_id: Some("tenant-a".to_string()),
            status: Some(ApprovalStatus::Pending),
            entity_kind: Some(EntityKind::PurchaseOrder),
            requester_id: Some("u-1".to_string()),
            approver_id: Some("u-2".to_string()),
        }
        .matches(&request));
        assert!(!ApprovalFilter { tenant_id: Some("tenant-b".to_string()), ..Default::default() }
            .matches(&request));
        assert!(!ApprovalFilter { entity_kind: Some(EntityKind::SaleOrder), ..Default::default() }
            .matches(&request));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Approved".parse::<ApprovalStatus>().expect("parse"), ApprovalStatus::Approved);
        assert!("escalated".parse::<ApprovalStatus>().is_err());
    }
}
