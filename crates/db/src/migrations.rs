use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

pub const MANAGED_TABLES: &[&str] =
    &["approval_request", "purchase_order", "sale_order", "production"];

/// Names from `MANAGED_TABLES` that are missing from the connected schema.
pub async fn missing_tables(pool: &DbPool) -> Result<Vec<&'static str>, sqlx::Error> {
    let mut missing = Vec::new();
    for table in MANAGED_TABLES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;
        if count == 0 {
            missing.push(*table);
        }
    }
    Ok(missing)
}
