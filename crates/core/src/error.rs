use crate::types::DbId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable code for the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller may retry the operation after re-reading.
    ///
    /// The core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Timeout(_) | Self::Internal(_))
    }

    /// Turn a `NotFound` for a referenced row into a `Validation` error.
    ///
    /// Used when an input field points at a row that does not exist: the
    /// request is malformed rather than the target missing.
    pub fn into_reference_error(self, field: &str) -> Self {
        match self {
            Self::NotFound { entity, id } => {
                Self::Validation(format!("{field} references unknown {entity} {id}"))
            }
            other => other,
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CoreError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(
            CoreError::NotFound { entity: "Ticket", id: DbId::nil() }.code(),
            "NOT_FOUND"
        );
        assert_eq!(CoreError::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(
            CoreError::InvalidTransition { entity: "Ticket", from: "CLOSED", to: "OPEN" }.code(),
            "INVALID_TRANSITION"
        );
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(CoreError::Conflict("stale".into()).is_retryable());
        assert!(CoreError::Timeout("slow".into()).is_retryable());
        assert!(!CoreError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn reference_error_rewrites_not_found() {
        let err = CoreError::NotFound { entity: "Asset", id: DbId::nil() }
            .into_reference_error("asset_id");
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("asset_id")));

        let conflict = CoreError::Conflict("x".into()).into_reference_error("asset_id");
        assert_eq!(conflict, CoreError::Conflict("x".into()));
    }
}
