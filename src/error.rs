//! Error types for the cache agent
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::transport::TransportError;

// == Agent Error Enum ==
/// Unified error type for the cache agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// A manifest resource could not be fetched during install
    #[error("Install failed fetching {resource}: {reason}")]
    InstallFetch { resource: String, reason: String },

    /// A stale generation could not be deleted during activation
    #[error("Failed to delete generation {name}: {reason}")]
    ActivationDelete { name: String, reason: String },

    /// Network fetch failed on a cache miss
    #[error(transparent)]
    Network(#[from] TransportError),

    /// Storing a response in the cache failed
    #[error("Cache write failed for {request_id}: {reason}")]
    CacheWrite { request_id: String, reason: String },

    /// Underlying storage failure (I/O, corrupt index)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Requested entry or generation does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data or configuration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Lifecycle signal arrived in the wrong state
    #[error("Invalid lifecycle state: {0}")]
    InvalidState(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Storage(format!("corrupt record: {}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = match &self {
            AgentError::InstallFetch { .. } | AgentError::Network(_) => StatusCode::BAD_GATEWAY,
            AgentError::NotFound(_) => StatusCode::NOT_FOUND,
            AgentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AgentError::InvalidState(_) => StatusCode::CONFLICT,
            AgentError::ActivationDelete { .. }
            | AgentError::CacheWrite { .. }
            | AgentError::Storage(_)
            | AgentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache agent.
pub type Result<T> = std::result::Result<T, AgentError>;
