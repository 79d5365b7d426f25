//! Agent Statistics Module
//!
//! Tracks interception outcomes: hits, misses, bypasses and failures.

use serde::Serialize;

// == Agent Stats ==
/// Tracks request interception metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStats {
    /// Requests answered from the cache
    pub hits: u64,
    /// Requests that missed the cache and went to the network
    pub misses: u64,
    /// Requests passed straight to the network without a lookup
    pub bypasses: u64,
    /// Network fetches issued by the interceptor
    pub network_fetches: u64,
    /// Network fetches that failed
    pub network_failures: u64,
    /// Fetched responses that could not be stored
    pub write_failures: u64,
}

impl AgentStats {
    // == Constructor ==
    /// Creates a new AgentStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_bypass(&mut self) {
        self.bypasses += 1;
    }

    pub fn record_fetch(&mut self) {
        self.network_fetches += 1;
    }

    pub fn record_network_failure(&mut self) {
        self.network_failures += 1;
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = AgentStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.bypasses, 0);
        assert_eq!(stats.network_fetches, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = AgentStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_ignores_bypasses() {
        let mut stats = AgentStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_bypass();
        stats.record_bypass();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_failure_counters() {
        let mut stats = AgentStats::new();
        stats.record_fetch();
        stats.record_network_failure();
        stats.record_write_failure();
        assert_eq!(stats.network_fetches, 1);
        assert_eq!(stats.network_failures, 1);
        assert_eq!(stats.write_failures, 1);
    }
}
