use std::sync::Arc;

use gatekeep_core::config::{AppConfig, ConfigError, LoadOptions};
use gatekeep_core::gate::EntityGate;
use gatekeep_db::{
    connect_with_config, migrations, sql_accessor_registry, DbPool, SqlApprovalLedger,
};
use thiserror::Error;
use tracing::info;

use crate::audit::TracingAuditSink;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub gate: Arc<EntityGate>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let gate = EntityGate::new(
        Arc::new(SqlApprovalLedger::new(db_pool.clone())),
        sql_accessor_registry(&db_pool),
    )
    .with_audit_sink(Arc::new(TracingAuditSink));
    info!(
        event_name = "system.bootstrap.gate_ready",
        correlation_id = "bootstrap",
        entity_kinds = ?gate.supported_kinds(),
        "entity gate initialized"
    );

    Ok(Application { config, db_pool, gate: Arc::new(gate) })
}

#[cfg(test)]
mod tests {
    use gatekeep_core::config::{ConfigOverrides, LoadOptions};
    use gatekeep_core::domain::entity::EntityKind;
    use gatekeep_core::gate::RequestApproval;
    use gatekeep_db::SqlEntityAccessor;
    use tempfile::TempDir;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_configuration() {
        let mut options = options("sqlite::memory:");
        options.overrides.database_max_connections = Some(0);

        let result = bootstrap(options).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_wires_every_entity_kind() {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}/gatekeep.db?mode=rwc", dir.path().display());

        let app = bootstrap(options(&url)).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' \
             AND name IN ('approval_request', 'purchase_order', 'sale_order', 'production')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables");
        assert_eq!(table_count, 4);
        assert_eq!(app.gate.supported_kinds(), EntityKind::ALL.to_vec());

        SqlEntityAccessor::new(app.db_pool.clone(), EntityKind::SaleOrder)
            .insert_draft("so-1", Some("t-1"), "u-sales", "SO-1")
            .await
            .expect("seed");
        let request = app
            .gate
            .request_approval(RequestApproval {
                entity_kind: EntityKind::SaleOrder,
                entity_id: "so-1".to_string(),
                tenant_id: Some("t-1".to_string()),
                requester_id: "u-sales".to_string(),
                approver_id: None,
                level: None,
                comments: None,
            })
            .await
            .expect("request through the wired gate");
        assert_eq!(request.entity_kind, EntityKind::SaleOrder);

        app.db_pool.close().await;
    }
}
