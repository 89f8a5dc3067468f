use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use gatekeep_core::domain::approval::{ApprovalFilter, ApprovalId, ApprovalRequest, ApprovalStatus};
use gatekeep_core::domain::entity::EntityKind;
use gatekeep_core::errors::{InterfaceError, WorkflowError};
use gatekeep_core::gate::{Decision, EntityGate, RequestApproval, UnlockOutcome};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApprovalsState {
    gate: Arc<EntityGate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestApprovalBody {
    #[serde(alias = "entityKind")]
    pub entity_type: String,
    pub entity_id: String,
    pub tenant_id: Option<String>,
    pub requester_id: String,
    pub approver_id: Option<String>,
    pub level: Option<u32>,
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionBody {
    pub approver_id: String,
    pub comments: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    pub tenant_id: Option<String>,
    pub status: Option<String>,
    pub entity_type: Option<String>,
    pub requester_id: Option<String>,
    pub approver_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockBody {
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanEditQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanEditResponse {
    pub can_edit: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub kind: &'static str,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(gate: Arc<EntityGate>) -> Router {
    Router::new()
        .route("/api/v1/approvals/request", post(request_approval))
        .route("/api/v1/approvals/pending", get(pending_approvals))
        .route("/api/v1/approvals/history/{entity_type}/{entity_id}", get(entity_history))
        .route("/api/v1/approvals/unlock/{entity_type}/{entity_id}", post(unlock_entity))
        .route("/api/v1/approvals/can-edit/{entity_type}/{entity_id}", get(can_edit))
        .route("/api/v1/approvals/{approval_id}/approve", post(approve))
        .route("/api/v1/approvals/{approval_id}/reject", post(reject))
        .with_state(ApprovalsState { gate })
}

async fn request_approval(
    State(state): State<ApprovalsState>,
    Json(body): Json<RequestApprovalBody>,
) -> ApiResult<ApprovalRequest> {
    let entity_kind = parse_kind(&body.entity_type).map_err(|e| api_error("request", e))?;

    let request = state
        .gate
        .request_approval(RequestApproval {
            entity_kind,
            entity_id: body.entity_id,
            tenant_id: body.tenant_id,
            requester_id: body.requester_id,
            approver_id: body.approver_id,
            level: body.level,
            comments: body.comments,
        })
        .await
        .map_err(|e| api_error("request", e))?;

    info!(
        event_name = "approvals.request.created",
        correlation_id = %request.id,
        entity_kind = %request.entity_kind,
        entity_id = %request.entity_id,
        "approval requested"
    );
    Ok(Json(request))
}

async fn approve(
    Path(approval_id): Path<String>,
    State(state): State<ApprovalsState>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<ApprovalRequest> {
    decide(state, approval_id, ApprovalStatus::Approved, body).await
}

async fn reject(
    Path(approval_id): Path<String>,
    State(state): State<ApprovalsState>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<ApprovalRequest> {
    decide(state, approval_id, ApprovalStatus::Rejected, body).await
}

async fn decide(
    state: ApprovalsState,
    approval_id: String,
    outcome: ApprovalStatus,
    body: DecisionBody,
) -> ApiResult<ApprovalRequest> {
    let approval_id = ApprovalId(approval_id);
    let decision = Decision { approver_id: body.approver_id, comments: body.comments };
    let result = match outcome {
        ApprovalStatus::Approved => state.gate.approve(&approval_id, decision).await,
        _ => state.gate.reject(&approval_id, decision).await,
    };
    let decided = result.map_err(|e| api_error(outcome.as_str(), e))?;

    info!(
        event_name = "approvals.request.decided",
        correlation_id = %decided.id,
        entity_kind = %decided.entity_kind,
        entity_id = %decided.entity_id,
        status = %decided.status,
        "approval decided"
    );
    Ok(Json(decided))
}

async fn pending_approvals(
    State(state): State<ApprovalsState>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Vec<ApprovalRequest>> {
    let filter = pending_filter(query).map_err(|e| api_error("pending", e))?;
    let approvals =
        state.gate.pending_approvals(&filter).await.map_err(|e| api_error("pending", e))?;
    Ok(Json(approvals))
}

async fn entity_history(
    Path((entity_type, entity_id)): Path<(String, String)>,
    State(state): State<ApprovalsState>,
) -> ApiResult<Vec<ApprovalRequest>> {
    let kind = parse_kind(&entity_type).map_err(|e| api_error("history", e))?;
    let history = state
        .gate
        .entity_approval_history(kind, &entity_id)
        .await
        .map_err(|e| api_error("history", e))?;
    Ok(Json(history))
}

async fn unlock_entity(
    Path((entity_type, entity_id)): Path<(String, String)>,
    State(state): State<ApprovalsState>,
    Json(body): Json<UnlockBody>,
) -> ApiResult<UnlockOutcome> {
    let kind = parse_kind(&entity_type).map_err(|e| api_error("unlock", e))?;
    let outcome = state
        .gate
        .unlock_entity(kind, &entity_id, &body.user_id)
        .await
        .map_err(|e| api_error("unlock", e))?;

    info!(
        event_name = "approvals.entity.unlocked",
        correlation_id = %entity_id,
        entity_kind = %kind,
        entity_id = %entity_id,
        user_id = %body.user_id,
        "entity unlocked"
    );
    Ok(Json(outcome))
}

async fn can_edit(
    Path((entity_type, entity_id)): Path<(String, String)>,
    State(state): State<ApprovalsState>,
    Query(query): Query<CanEditQuery>,
) -> ApiResult<CanEditResponse> {
    let kind = parse_kind(&entity_type).map_err(|e| api_error("can_edit", e))?;
    let user_id = query.user_id.unwrap_or_default();
    let can_edit = state
        .gate
        .can_edit(kind, &entity_id, &user_id)
        .await
        .map_err(|e| api_error("can_edit", e))?;
    Ok(Json(CanEditResponse { can_edit }))
}

fn parse_kind(raw: &str) -> Result<EntityKind, WorkflowError> {
    EntityKind::from_str(raw)
}

fn pending_filter(query: PendingQuery) -> Result<ApprovalFilter, WorkflowError> {
    Ok(ApprovalFilter {
        tenant_id: non_empty(query.tenant_id),
        status: non_empty(query.status).map(|raw| ApprovalStatus::from_str(&raw)).transpose()?,
        entity_kind: non_empty(query.entity_type).map(|raw| parse_kind(&raw)).transpose()?,
        requester_id: non_empty(query.requester_id),
        approver_id: non_empty(query.approver_id),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn api_error(
    operation: &'static str,
    workflow_error: WorkflowError,
) -> (StatusCode, Json<ApiError>) {
    let kind = workflow_error.kind();
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let interface = workflow_error.into_interface(correlation_id);

    let (status, message) = match &interface {
        InterfaceError::NotFound { message, .. } => {
            warn!(
                event_name = "approvals.error.not_found",
                correlation_id = %interface.correlation_id(),
                operation,
                error = %message,
                "approval operation refused"
            );
            (StatusCode::NOT_FOUND, message.clone())
        }
        InterfaceError::Conflict { message, .. } => {
            warn!(
                event_name = "approvals.error.conflict",
                correlation_id = %interface.correlation_id(),
                operation,
                error = %message,
                "approval operation refused"
            );
            (StatusCode::CONFLICT, message.clone())
        }
        InterfaceError::ServiceUnavailable { message, .. } => {
            error!(
                event_name = "approvals.error.storage",
                correlation_id = %interface.correlation_id(),
                operation,
                error = %message,
                "approval operation failed"
            );
            (StatusCode::SERVICE_UNAVAILABLE, interface.user_message().to_string())
        }
    };

    (
        status,
        Json(ApiError {
            error: message,
            kind,
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}
