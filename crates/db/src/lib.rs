pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{DemoDataset, SeedResult};
pub use repositories::{
    sql_accessor_registry, EntityTable, InMemoryApprovalLedger, InMemoryEntityAccessor,
    RepositoryError, SqlApprovalLedger, SqlEntityAccessor,
};
