use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use gatekeep_core::errors::WorkflowError;

pub mod approval;
pub mod entity;
pub mod memory;

pub use approval::SqlApprovalLedger;
pub use entity::{sql_accessor_registry, EntityTable, SqlEntityAccessor};
pub use memory::{InMemoryApprovalLedger, InMemoryEntityAccessor};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for WorkflowError {
    fn from(value: RepositoryError) -> Self {
        WorkflowError::Storage(value.to_string())
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn decode_optional_timestamp(
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| decode_timestamp(column, &value)).transpose()
}
