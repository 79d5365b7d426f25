//! Request DTOs for the agent control API
//!
//! Defines the structure of incoming query parameters.

use serde::Deserialize;

/// Query for the cache inspection endpoint (GET /__agent/match)
///
/// # Fields
/// - `path`: The request identifier to look up
/// - `ignore_query`: Use relaxed matching (default: true)
/// - `generation`: Restrict the lookup to one generation
#[derive(Debug, Clone, Deserialize)]
pub struct MatchQuery {
    pub path: String,
    #[serde(default = "default_ignore_query")]
    pub ignore_query: bool,
    #[serde(default)]
    pub generation: Option<String>,
}

fn default_ignore_query() -> bool {
    true
}

impl MatchQuery {
    /// Validates the query
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.path.is_empty() {
            return Some("Path cannot be empty".to_string());
        }
        if !self.path.starts_with('/') {
            return Some("Path must start with '/'".to_string());
        }
        None
    }
}
