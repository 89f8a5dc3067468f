use crate::domain::entity::{EntityApprovalStatus, EntityView};
use crate::errors::WorkflowError;

/// Whether a new approval request may be opened for `entity`.
pub fn ensure_requestable(entity: &EntityView) -> Result<(), WorkflowError> {
    match entity.approval_status {
        EntityApprovalStatus::Pending => Err(WorkflowError::InvalidState(format!(
            "{} `{}` already has a pending approval request",
            entity.kind, entity.id
        ))),
        EntityApprovalStatus::Approved => Err(WorkflowError::InvalidState(format!(
            "{} `{}` is already approved",
            entity.kind, entity.id
        ))),
        _ => Ok(()),
    }
}

/// Edit permission for `user_id` given the entity's workflow fields.
///
/// Approved-and-locked never yields `true`, whoever asks. An approved entity
/// whose lock has been cleared is editable again.
pub fn can_edit(entity: &EntityView, user_id: &str) -> bool {
    match &entity.approval_status {
        EntityApprovalStatus::Approved => !entity.is_locked(),
        EntityApprovalStatus::Draft | EntityApprovalStatus::Rejected => true,
        EntityApprovalStatus::Pending => entity.is_created_by(user_id),
        EntityApprovalStatus::Other(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{can_edit, ensure_requestable};
    use crate::domain::entity::{EntityApprovalStatus, EntityKind, EntityView};
    use crate::errors::WorkflowError;

    fn entity(status: EntityApprovalStatus) -> EntityView {
        let mut entity = EntityView::draft(EntityKind::PurchaseOrder, "PO-1").with_user("u-1");
        entity.approval_status = status;
        entity
    }

    #[test]
    fn draft_rejected_and_unknown_statuses_are_requestable() {
        assert!(ensure_requestable(&entity(EntityApprovalStatus::Draft)).is_ok());
        assert!(ensure_requestable(&entity(EntityApprovalStatus::Rejected)).is_ok());
        assert!(ensure_requestable(&entity(EntityApprovalStatus::Other("void".into()))).is_ok());
    }

    #[test]
    fn pending_and_approved_are_not_requestable() {
        let pending = ensure_requestable(&entity(EntityApprovalStatus::Pending));
        let approved = ensure_requestable(&entity(EntityApprovalStatus::Approved));

        assert!(matches!(pending, Err(WorkflowError::InvalidState(ref m)) if m.contains("pending")));
        assert!(
            matches!(approved, Err(WorkflowError::InvalidState(ref m)) if m.contains("already approved"))
        );
    }

    #[test]
    fn approved_and_locked_is_read_only_for_everyone() {
        let mut locked = entity(EntityApprovalStatus::Approved);
        locked.locked_at = Some(Utc::now());
        locked.locked_by = Some("u-2".to_string());

        assert!(!can_edit(&locked, "u-1"));
        assert!(!can_edit(&locked, "u-2"));
        assert!(!can_edit(&locked, "admin"));
    }

    #[test]
    fn approved_after_unlock_is_editable() {
        assert!(can_edit(&entity(EntityApprovalStatus::Approved), "u-3"));
    }

    #[test]
    fn pending_is_editable_only_by_the_creator() {
        let pending = entity(EntityApprovalStatus::Pending);
        let mut production = EntityView::draft(EntityKind::Production, "PR-1").with_requester("u-7");
        production.approval_status = EntityApprovalStatus::Pending;

        assert!(can_edit(&pending, "u-1"));
        assert!(!can_edit(&pending, "u-2"));
        assert!(can_edit(&production, "u-7"));
        assert!(!can_edit(&production, "u-1"));
    }

    #[test]
    fn draft_and_rejected_are_editable_by_anyone() {
        assert!(can_edit(&entity(EntityApprovalStatus::Draft), "someone"));
        assert!(can_edit(&entity(EntityApprovalStatus::Rejected), "someone"));
    }

    #[test]
    fn unknown_status_fails_closed() {
        assert!(!can_edit(&entity(EntityApprovalStatus::Other("archived".into())), "u-1"));
    }
}
