//! Structured error types for engine operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Structural validation errors (rejected before any mutation)
    SelfDependency,
    CircularDependency,
    TaskNotFound,
    InvalidWeight,

    // Diagnostic / invariant errors
    PositionInvariantViolation,

    // Collaborator errors
    RepositoryError,
}

/// Structured error returned by engine operations.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn self_dependency(task_id: &str) -> Self {
        Self::new(
            ErrorCode::SelfDependency,
            format!("Task {} cannot depend on itself", task_id),
        )
    }

    pub fn circular_dependency(task_id: &str, depends_on: &str) -> Self {
        Self::new(
            ErrorCode::CircularDependency,
            format!(
                "Adding dependency {} -> {} would create a cycle",
                task_id, depends_on
            ),
        )
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn invalid_weight(task_id: &str, weight: f64, min: f64, max: f64) -> Self {
        Self::new(
            ErrorCode::InvalidWeight,
            format!(
                "Weight {} for task {} is outside [{}, {}]",
                weight, task_id, min, max
            ),
        )
        .with_field("weight")
    }

    pub fn position_invariant(column_id: &str, details: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::PositionInvariantViolation,
            format!("Position invariant violated in column {}", column_id),
        )
        .with_details(details.to_string())
    }

    pub fn repository(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::RepositoryError, err.to_string())
    }
}

// Allow using ? on repository results by converting them
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to EngineError first
        match err.downcast::<EngineError>() {
            Ok(engine_err) => engine_err,
            Err(err) => EngineError::repository(err),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_round_trip_preserves_code() {
        let original = EngineError::self_dependency("t1");
        let wrapped: anyhow::Error = original.into();
        let back: EngineError = wrapped.into();
        assert_eq!(back.code, ErrorCode::SelfDependency);
    }

    #[test]
    fn foreign_anyhow_becomes_repository_error() {
        let err: EngineError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(err.code, ErrorCode::RepositoryError);
        assert_eq!(err.message, "disk on fire");
    }
}
