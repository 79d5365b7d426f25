//! Request and Response models for the agent control API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing control endpoint bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::MatchQuery;
pub use responses::{ErrorResponse, HealthResponse, MatchResponse, StatsResponse, StatusResponse};
