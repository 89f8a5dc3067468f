//! SQL adapters for the approvable document tables.
//!
//! Each kind lives in its own table and may name its creator column
//! differently; `EntityTable` captures those differences so that one
//! `SqlEntityAccessor` implementation serves every kind.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};

use gatekeep_core::domain::approval::ApprovalId;
use gatekeep_core::domain::entity::{
    EntityApprovalStatus, EntityKind, EntityPatch, EntityView, LockChange,
};
use gatekeep_core::errors::WorkflowError;
use gatekeep_core::gate::{AccessorRegistry, EntityAccessor};

use super::{decode_optional_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityTable {
    pub kind: EntityKind,
    pub table: &'static str,
    pub user_column: Option<&'static str>,
    pub requester_column: Option<&'static str>,
}

pub const PURCHASE_ORDER_TABLE: EntityTable = EntityTable {
    kind: EntityKind::PurchaseOrder,
    table: "purchase_order",
    user_column: Some("user_id"),
    requester_column: None,
};

pub const SALE_ORDER_TABLE: EntityTable = EntityTable {
    kind: EntityKind::SaleOrder,
    table: "sale_order",
    user_column: Some("user_id"),
    requester_column: None,
};

pub const PRODUCTION_TABLE: EntityTable = EntityTable {
    kind: EntityKind::Production,
    table: "production",
    user_column: None,
    requester_column: Some("requester_id"),
};

impl EntityTable {
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::PurchaseOrder => PURCHASE_ORDER_TABLE,
            EntityKind::SaleOrder => SALE_ORDER_TABLE,
            EntityKind::Production => PRODUCTION_TABLE,
        }
    }

    /// Column holding the creator of a row; used when inserting.
    pub fn creator_column(&self) -> &'static str {
        self.user_column.or(self.requester_column).unwrap_or("user_id")
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT id, tenant_id, approval_status, approval_id, locked_at, locked_by,
                    {} AS user_id, {} AS requester_id
             FROM {} WHERE id = ?",
            self.user_column.unwrap_or("NULL"),
            self.requester_column.unwrap_or("NULL"),
            self.table
        )
    }
}

pub struct SqlEntityAccessor {
    pool: DbPool,
    table: EntityTable,
}

impl SqlEntityAccessor {
    pub fn new(pool: DbPool, kind: EntityKind) -> Self {
        Self { pool, table: EntityTable::for_kind(kind) }
    }

    pub fn table(&self) -> EntityTable {
        self.table
    }

    /// Inserts a `draft` row unless one with the same id exists. Returns
    /// whether a row was written.
    pub async fn insert_draft(
        &self,
        id: &str,
        tenant_id: Option<&str>,
        creator_id: &str,
        reference: &str,
    ) -> Result<bool, RepositoryError> {
        let now = encode_timestamp(Utc::now());
        let result = sqlx::query(&format!(
            "INSERT INTO {} (id, tenant_id, reference, {}, approval_status, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'draft', ?, ?)
             ON CONFLICT(id) DO NOTHING",
            self.table.table,
            self.table.creator_column()
        ))
        .bind(id)
        .bind(tenant_id)
        .bind(reference)
        .bind(creator_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: &str) -> Result<Option<EntityView>, RepositoryError> {
        let row = sqlx::query(&self.table.select_sql()).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(|row| row_to_entity(self.table.kind, row)).transpose()
    }
}

fn row_to_entity(
    kind: EntityKind,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<EntityView, RepositoryError> {
    let get_opt = |column: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(EntityView {
        kind,
        id,
        tenant_id: get_opt("tenant_id")?,
        approval_status: EntityApprovalStatus::from_stored(get_opt("approval_status")?.as_deref()),
        approval_id: get_opt("approval_id")?.map(ApprovalId),
        locked_at: decode_optional_timestamp("locked_at", get_opt("locked_at")?)?,
        locked_by: get_opt("locked_by")?,
        user_id: get_opt("user_id")?,
        requester_id: get_opt("requester_id")?,
    })
}

#[async_trait::async_trait]
impl EntityAccessor for SqlEntityAccessor {
    fn kind(&self) -> EntityKind {
        self.table.kind
    }

    async fn get(&self, id: &str) -> Result<Option<EntityView>, WorkflowError> {
        Ok(self.find(id).await?)
    }

    async fn update(&self, id: &str, patch: EntityPatch) -> Result<EntityView, WorkflowError> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET updated_at = ", self.table.table));
        query.push_bind(encode_timestamp(Utc::now()));

        if let Some(status) = &patch.approval_status {
            query.push(", approval_status = ").push_bind(status.as_str().to_string());
        }
        if let Some(approval_id) = &patch.approval_id {
            query.push(", approval_id = ").push_bind(approval_id.0.clone());
        }
        match &patch.lock {
            Some(LockChange::Set { at, by }) => {
                query.push(", locked_at = ").push_bind(encode_timestamp(*at));
                query.push(", locked_by = ").push_bind(by.clone());
            }
            Some(LockChange::Clear) => {
                query.push(", locked_at = NULL, locked_by = NULL");
            }
            None => {}
        }
        query.push(" WHERE id = ").push_bind(id.to_string());

        let result =
            query.build().execute(&self.pool).await.map_err(RepositoryError::from)?;
        let not_found = || WorkflowError::NotFound(format!("{} `{id}`", self.table.kind));
        if result.rows_affected() == 0 {
            return Err(not_found());
        }

        self.find(id).await?.ok_or_else(not_found)
    }
}

/// One SQL accessor per supported kind, all sharing `pool`.
pub fn sql_accessor_registry(pool: &DbPool) -> AccessorRegistry {
    EntityKind::ALL.into_iter().fold(AccessorRegistry::new(), |registry, kind| {
        registry.with(Arc::new(SqlEntityAccessor::new(pool.clone(), kind)))
    })
}
