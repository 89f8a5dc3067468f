pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod gate;
pub mod ledger;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use domain::approval::{
    ApprovalFilter, ApprovalId, ApprovalRequest, ApprovalStatus, NewApprovalRequest,
};
pub use domain::entity::{EntityApprovalStatus, EntityKind, EntityPatch, EntityView, LockChange};
pub use errors::{InterfaceError, WorkflowError};
pub use gate::{
    AccessorRegistry, Decision, EntityAccessor, EntityGate, RequestApproval, UnlockOutcome,
};
pub use ledger::ApprovalLedger;
