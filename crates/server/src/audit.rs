use gatekeep_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use tracing::{error, info, warn};

/// Writes gate audit events to the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let approval_id = event.approval_id.as_ref().map(|id| id.0.as_str()).unwrap_or("none");
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();

        match event.outcome {
            AuditOutcome::Success => info!(
                event_name = %event.event_type,
                correlation_id = %event.event_id,
                entity_kind = %event.entity_kind,
                entity_id = %event.entity_id,
                approval_id,
                actor = %event.actor,
                metadata = %metadata,
                "audit event"
            ),
            AuditOutcome::Rejected => warn!(
                event_name = %event.event_type,
                correlation_id = %event.event_id,
                entity_kind = %event.entity_kind,
                entity_id = %event.entity_id,
                approval_id,
                actor = %event.actor,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit event"
            ),
            AuditOutcome::Failed => error!(
                event_name = %event.event_type,
                correlation_id = %event.event_id,
                entity_kind = %event.entity_kind,
                entity_id = %event.entity_id,
                approval_id,
                actor = %event.actor,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit event: workflow left inconsistent"
            ),
        }
    }
}
