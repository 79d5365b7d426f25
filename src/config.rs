//! Configuration Module
//!
//! Handles loading and managing agent configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::MatchScope;

/// Default generation identifier.
pub const DEFAULT_GENERATION: &str = "v1";

/// Agent configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the current cache generation
    pub generation: String,
    /// Origin every intercepted request is forwarded to
    pub origin_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Network fetch timeout in seconds
    pub fetch_timeout: u64,
    /// Resources pre-cached at install time
    pub manifest: Vec<String>,
    /// Directory of the disk-backed store, in-memory store when None
    pub cache_dir: Option<PathBuf>,
    /// Which generations a lookup may be served from
    pub match_scope: MatchScope,
    /// Run install and activate at startup
    pub auto_lifecycle: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_GENERATION` - Current generation name (default: v1)
    /// - `ORIGIN_URL` - Network origin (default: http://127.0.0.1:8000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `FETCH_TIMEOUT` - Network timeout in seconds (default: 30)
    /// - `CACHE_MANIFEST` - Comma-separated manifest (default: built-in list)
    /// - `CACHE_DIR` - Disk store directory (default: unset, in-memory)
    /// - `MATCH_SCOPE` - `all` or `current` (default: all)
    /// - `AUTO_LIFECYCLE` - Install and activate on startup (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            generation: env::var("CACHE_GENERATION")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.generation),
            origin_url: env::var("ORIGIN_URL").unwrap_or(defaults.origin_url),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            fetch_timeout: env::var("FETCH_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fetch_timeout),
            manifest: env::var("CACHE_MANIFEST")
                .ok()
                .map(|v| parse_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.manifest),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            match_scope: env::var("MATCH_SCOPE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.match_scope),
            auto_lifecycle: env::var("AUTO_LIFECYCLE")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.auto_lifecycle),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: DEFAULT_GENERATION.to_string(),
            origin_url: "http://127.0.0.1:8000".to_string(),
            server_port: 3000,
            fetch_timeout: 30,
            manifest: crate::agent::Manifest::restaurant_reviews().into_entries(),
            cache_dir: None,
            match_scope: MatchScope::AllGenerations,
            auto_lifecycle: true,
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
