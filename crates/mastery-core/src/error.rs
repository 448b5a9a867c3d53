//! Error types.
//!
//! `StoreError` is defined here rather than in the storage crate so the
//! services can tell persistence failures apart from caller mistakes without
//! string matching.

use thiserror::Error;

/// Failures raised by a storage backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Persisted data could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(String),
}

/// Errors surfaced by the progress and recommendation engine.
#[derive(Debug, Error)]
pub enum MasteryError {
    /// Malformed or missing identifiers or fields in a request.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The underlying storage failed during a read or write.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl MasteryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MasteryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` if the request itself was at fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            MasteryError::Validation(_) | MasteryError::NotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MasteryError>;
