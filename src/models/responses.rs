//! Response DTOs for the agent control API
//!
//! Defines the structure of outgoing JSON bodies.

use serde::Serialize;

use crate::cache::{AgentStats, GenerationInfo, MatchScope};

/// Response body for GET /__agent/status
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Lifecycle state (e.g., "activated")
    pub state: String,
    /// Current generation identifier
    pub generation: String,
    pub match_scope: MatchScope,
    /// Number of manifest entries
    pub manifest_size: usize,
    /// Every generation held in storage, in creation order
    pub generations: Vec<GenerationInfo>,
}

/// Response body for GET /__agent/match
#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    /// The looked-up request identifier
    pub path: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Body size in bytes
    pub size: usize,
}

impl MatchResponse {
    pub fn new(path: impl Into<String>, status: u16, content_type: Option<String>, size: usize) -> Self {
        Self {
            path: path.into(),
            status,
            content_type,
            size,
        }
    }
}

/// Response body for GET /__agent/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
    pub network_fetches: u64,
    pub network_failures: u64,
    pub write_failures: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<AgentStats> for StatsResponse {
    fn from(stats: AgentStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            bypasses: stats.bypasses,
            network_fetches: stats.network_fetches,
            network_failures: stats.network_failures,
            write_failures: stats.write_failures,
        }
    }
}

/// Response body for GET /__agent/health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_hit_rate() {
        let mut stats = AgentStats::new();
        for _ in 0..4 {
            stats.record_hit();
        }
        stats.record_miss();
        let resp = StatsResponse::from(stats);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_status_response_serialize() {
        let resp = StatusResponse {
            state: "activated".to_string(),
            generation: "v2".to_string(),
            match_scope: MatchScope::CurrentOnly,
            manifest_size: 18,
            generations: vec![GenerationInfo {
                name: "v2".to_string(),
                entries: 18,
                complete: true,
            }],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["match_scope"], "current_only");
        assert_eq!(json["generations"][0]["complete"], true);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("Something went wrong"));
    }
}
