use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};

use gatekeep_core::domain::approval::{
    ApprovalFilter, ApprovalId, ApprovalRequest, ApprovalStatus, NewApprovalRequest,
};
use gatekeep_core::domain::entity::EntityKind;
use gatekeep_core::errors::WorkflowError;
use gatekeep_core::ledger::ApprovalLedger;

use super::{decode_optional_timestamp, decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

const SELECT_COLUMNS: &str = "SELECT id, entity_kind, entity_id, tenant_id, requester_id,
        approver_id, level, status, comments, requested_at, responded_at
     FROM approval_request";

const NEWEST_FIRST: &str = " ORDER BY requested_at DESC, rowid DESC";

pub struct SqlApprovalLedger {
    pool: DbPool,
}

impl SqlApprovalLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_by_id(
        &self,
        id: &ApprovalId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_approval).transpose()
    }
}

fn row_to_approval(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
    let get_str = |column: &str| -> Result<String, RepositoryError> {
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let get_opt = |column: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };

    let entity_kind = get_str("entity_kind")?
        .parse::<EntityKind>()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status = get_str("status")?
        .parse::<ApprovalStatus>()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let level: i64 = row.try_get("level").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let level = u32::try_from(level)
        .map_err(|_| RepositoryError::Decode(format!("level out of range: {level}")))?;

    Ok(ApprovalRequest {
        id: ApprovalId(get_str("id")?),
        entity_kind,
        entity_id: get_str("entity_id")?,
        tenant_id: get_opt("tenant_id")?,
        requester_id: get_str("requester_id")?,
        approver_id: get_opt("approver_id")?,
        level,
        status,
        comments: get_opt("comments")?,
        requested_at: decode_timestamp("requested_at", &get_str("requested_at")?)?,
        responded_at: decode_optional_timestamp("responded_at", get_opt("responded_at")?)?,
    })
}

#[async_trait::async_trait]
impl ApprovalLedger for SqlApprovalLedger {
    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest, WorkflowError> {
        let approval = request.into_pending(ApprovalId::generate(), Utc::now());

        sqlx::query(
            "INSERT INTO approval_request (id, entity_kind, entity_id, tenant_id, requester_id,
                                           approver_id, level, status, comments, requested_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&approval.id.0)
        .bind(approval.entity_kind.as_str())
        .bind(&approval.entity_id)
        .bind(&approval.tenant_id)
        .bind(&approval.requester_id)
        .bind(&approval.approver_id)
        .bind(i64::from(approval.level))
        .bind(approval.status.as_str())
        .bind(&approval.comments)
        .bind(encode_timestamp(approval.requested_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(approval)
    }

    async fn get(&self, id: &ApprovalId) -> Result<Option<ApprovalRequest>, WorkflowError> {
        Ok(self.find_by_id(id).await?)
    }

    async fn decide(
        &self,
        id: &ApprovalId,
        status: ApprovalStatus,
        approver_id: &str,
        comments: Option<&str>,
    ) -> Result<ApprovalRequest, WorkflowError> {
        let mut approval = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("approval request `{id}`")))?;
        approval.record_decision(status, approver_id, comments, Utc::now())?;

        // Conditional on `pending` so a decision that raced ahead of us wins.
        let result = sqlx::query(
            "UPDATE approval_request
             SET status = ?, approver_id = ?, responded_at = ?, comments = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(approval.status.as_str())
        .bind(&approval.approver_id)
        .bind(approval.responded_at.map(encode_timestamp))
        .bind(&approval.comments)
        .bind(&id.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(WorkflowError::InvalidState(format!(
                "approval request `{id}` was decided concurrently"
            )));
        }

        Ok(approval)
    }

    async fn list_by_filter(
        &self,
        filter: &ApprovalFilter,
    ) -> Result<Vec<ApprovalRequest>, WorkflowError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        query.push(" WHERE 1 = 1");
        if let Some(tenant_id) = &filter.tenant_id {
            query.push(" AND tenant_id = ").push_bind(tenant_id.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(kind) = filter.entity_kind {
            query.push(" AND entity_kind = ").push_bind(kind.as_str());
        }
        if let Some(requester_id) = &filter.requester_id {
            query.push(" AND requester_id = ").push_bind(requester_id.clone());
        }
        if let Some(approver_id) = &filter.approver_id {
            query.push(" AND approver_id = ").push_bind(approver_id.clone());
        }
        query.push(NEWEST_FIRST);

        let rows = query.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(rows.iter().map(row_to_approval).collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_by_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<ApprovalRequest>, WorkflowError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE entity_kind = ? AND entity_id = ?{NEWEST_FIRST}"
        ))
        .bind(kind.as_str())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_approval).collect::<Result<Vec<_>, _>>()?)
    }
}
