use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl WorkflowError {
    /// Only infrastructure failures are worth retrying; the other kinds are
    /// business-rule outcomes that a retry would reproduce.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::Storage(_) => "storage",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The requested approval or document does not exist.",
            Self::Conflict { .. } => {
                "The document is not in a state that allows this action. Refresh and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl WorkflowError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::NotFound(message) => InterfaceError::NotFound { message, correlation_id },
            Self::InvalidState(message) => InterfaceError::Conflict { message, correlation_id },
            Self::Storage(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{InterfaceError, WorkflowError};

    #[test]
    fn not_found_maps_to_not_found_interface_error() {
        let interface = WorkflowError::NotFound("approval `APR-1`".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::NotFound { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.message(), "approval `APR-1`");
    }

    #[test]
    fn invalid_state_maps_to_conflict_with_user_safe_message() {
        let interface =
            WorkflowError::InvalidState("already pending".to_owned()).into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert_eq!(
            interface.user_message(),
            "The document is not in a state that allows this action. Refresh and try again."
        );
    }

    #[test]
    fn storage_error_maps_to_service_unavailable() {
        let interface =
            WorkflowError::Storage("database lock timeout".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
    }

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(WorkflowError::Storage("io".to_owned()).is_retryable());
        assert!(!WorkflowError::NotFound("x".to_owned()).is_retryable());
        assert!(!WorkflowError::InvalidState("x".to_owned()).is_retryable());
    }
}
