use serde::Serialize;

use gatekeep_core::domain::entity::EntityKind;

use crate::connection::DbPool;
use crate::repositories::{EntityTable, RepositoryError, SqlEntityAccessor};

struct SeedEntity {
    kind: EntityKind,
    id: &'static str,
    tenant_id: &'static str,
    creator_id: &'static str,
    reference: &'static str,
}

/// Deterministic demo documents, one tenant per customer, all in `draft`.
const SEED_ENTITIES: &[SeedEntity] = &[
    SeedEntity {
        kind: EntityKind::PurchaseOrder,
        id: "po-demo-001",
        tenant_id: "tenant-acme",
        creator_id: "user-buyer-01",
        reference: "PO-2026-0001 Steel coils",
    },
    SeedEntity {
        kind: EntityKind::PurchaseOrder,
        id: "po-demo-002",
        tenant_id: "tenant-globex",
        creator_id: "user-buyer-02",
        reference: "PO-2026-0002 Packaging film",
    },
    SeedEntity {
        kind: EntityKind::SaleOrder,
        id: "so-demo-001",
        tenant_id: "tenant-acme",
        creator_id: "user-sales-01",
        reference: "SO-2026-0001 Spring distributor order",
    },
    SeedEntity {
        kind: EntityKind::Production,
        id: "prod-demo-001",
        tenant_id: "tenant-acme",
        creator_id: "user-planner-01",
        reference: "PR-2026-0001 Batch 12 extrusion run",
    },
];

pub struct DemoDataset;

impl DemoDataset {
    /// Inserts missing demo documents. Existing rows are left untouched so
    /// re-seeding never resets an entity's approval state.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut result = SeedResult::default();

        for seed in SEED_ENTITIES {
            let accessor = SqlEntityAccessor::new(pool.clone(), seed.kind);
            let inserted = accessor
                .insert_draft(seed.id, Some(seed.tenant_id), seed.creator_id, seed.reference)
                .await?;
            if inserted {
                result.inserted += 1;
            } else {
                result.skipped += 1;
            }
            result.entities.push(SeededEntity {
                kind: seed.kind,
                id: seed.id,
                creator_id: seed.creator_id,
            });
        }

        Ok(result)
    }

    /// `true` once every demo document exists in its table.
    pub async fn verify(pool: &DbPool) -> Result<bool, RepositoryError> {
        for seed in SEED_ENTITIES {
            let table = EntityTable::for_kind(seed.kind).table;
            let count: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE id = ?"))
                    .bind(seed.id)
                    .fetch_one(pool)
                    .await?;
            if count == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn len() -> usize {
        SEED_ENTITIES.len()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SeedResult {
    pub inserted: usize,
    pub skipped: usize,
    pub entities: Vec<SeededEntity>,
}

#[derive(Debug, Serialize)]
pub struct SeededEntity {
    pub kind: EntityKind,
    pub id: &'static str,
    pub creator_id: &'static str,
}

#[cfg(test)]
mod tests {
    use super::DemoDataset;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn load_inserts_every_demo_entity() {
        let pool = setup().await;
        assert!(!DemoDataset::verify(&pool).await.expect("verify empty"));

        let result = DemoDataset::load(&pool).await.expect("seed");

        assert_eq!(result.inserted, DemoDataset::len());
        assert_eq!(result.skipped, 0);
        assert!(DemoDataset::verify(&pool).await.expect("verify"));
    }

    #[tokio::test]
    async fn reloading_is_idempotent() {
        let pool = setup().await;
        DemoDataset::load(&pool).await.expect("first seed");

        let second = DemoDataset::load(&pool).await.expect("second seed");

        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, DemoDataset::len());
        let production_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM production")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(production_rows, 1);
    }
}
