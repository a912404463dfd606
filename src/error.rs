//! Structured error types for move responses.

use serde::{Deserialize, Serialize};

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Deterministic rejections
    NodeNotFound,
    CrossScope,
    CycleRejected,

    // Retryable failures
    ConcurrencyConflict,
    TransportFailure,

    // Internal errors
    DatabaseError,
}

/// Errors produced by the move engine.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Target parent {parent} is in project {parent_project}, node {node} is in {node_project}")]
    CrossScope {
        node: String,
        node_project: String,
        parent: String,
        parent_project: String,
    },

    #[error("Moving {node} under {parent} would make it its own ancestor")]
    CycleRejected { node: String, parent: String },

    #[error("Scope is busy, move could not be committed: {0}")]
    ConcurrencyConflict(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl MoveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MoveError::NotFound(_) => ErrorCode::NodeNotFound,
            MoveError::CrossScope { .. } => ErrorCode::CrossScope,
            MoveError::CycleRejected { .. } => ErrorCode::CycleRejected,
            MoveError::ConcurrencyConflict(_) => ErrorCode::ConcurrencyConflict,
            MoveError::TransportFailure(_) => ErrorCode::TransportFailure,
            MoveError::Database(_) => ErrorCode::DatabaseError,
        }
    }

    /// Whether the caller may retry the original gesture. Deterministic
    /// rejections are final; conflicts and transport failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MoveError::ConcurrencyConflict(_) | MoveError::TransportFailure(_)
        )
    }

    pub fn self_parent(node: &str) -> Self {
        MoveError::CycleRejected {
            node: node.to_string(),
            parent: node.to_string(),
        }
    }

    pub fn cycle(node: &str, parent: &str) -> Self {
        MoveError::CycleRejected {
            node: node.to_string(),
            parent: parent.to_string(),
        }
    }
}

impl From<rusqlite::Error> for MoveError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode as Sqlite;
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, Sqlite::DatabaseBusy | Sqlite::DatabaseLocked) =>
            {
                MoveError::ConcurrencyConflict(err.to_string())
            }
            _ => MoveError::Database(err.into()),
        }
    }
}

/// Serialized error body carried in HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&MoveError> for ErrorBody {
    fn from(err: &MoveError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result type for move operations.
pub type MoveResult<T> = std::result::Result<T, MoveError>;
