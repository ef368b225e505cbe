pub mod events;
pub mod listing;
pub mod payment;
pub mod users;

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Duplicate value violates a unique constraint: {0}")]
    DuplicateConstraint(String),
    #[error("Unrecognized status: {0}")]
    InvalidStatus(String),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Not permitted: {0}")]
    Forbidden(String),
    #[error("Record was changed concurrently: {0}")]
    Conflict(String),
    #[error("Package is fully booked: {0}")]
    CapacityExhausted(Uuid),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound { entity, id: id.to_string() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::ValidationFailed(msg.into())
    }

    /// Errors the caller can show to the user as-is.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CoreError::Storage(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
