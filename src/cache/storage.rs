//! Cache Storage Module
//!
//! The store interface shared by the installer, activator and interceptor,
//! plus the per-generation handle used to write into it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::cache::{key, CachedResponse};
use crate::error::{AgentError, Result};

/// Shared, thread-safe store handle.
pub type SharedStorage = Arc<dyn CacheStorage>;

// == Match Scope ==
/// Which generations a lookup may be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScope {
    /// Any generation held in storage, oldest first
    AllGenerations,
    /// Only the current generation
    CurrentOnly,
}

impl FromStr for MatchScope {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "any" => Ok(MatchScope::AllGenerations),
            "current" => Ok(MatchScope::CurrentOnly),
            other => Err(AgentError::InvalidRequest(format!(
                "unknown match scope '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for MatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchScope::AllGenerations => f.write_str("all"),
            MatchScope::CurrentOnly => f.write_str("current"),
        }
    }
}

// == Match Options ==
/// Options for [`CacheStorage::match_any`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare identifiers with their query strings removed
    pub ignore_query: bool,
    /// Restrict the lookup to one generation
    pub generation: Option<String>,
}

impl MatchOptions {
    /// Relaxed matching across every generation.
    pub fn ignore_query() -> Self {
        Self {
            ignore_query: true,
            generation: None,
        }
    }

    /// Restricts the lookup to a single generation.
    pub fn in_generation(mut self, name: impl Into<String>) -> Self {
        self.generation = Some(name.into());
        self
    }

    /// Returns true if `stored` matches `requested` under these options.
    pub fn matches(&self, stored: &str, requested: &str) -> bool {
        key::match_key(stored, self.ignore_query) == key::match_key(requested, self.ignore_query)
    }
}

// == Generation Info ==
/// Summary of one generation held in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: usize,
    /// Set once an install has committed every manifest entry
    pub complete: bool,
}

// == Storage Trait ==
/// A key-value store of named cache generations.
///
/// Implementations must be safe for concurrent use: a read never observes a
/// half-written entry, and concurrent writes to one key leave one of the
/// written values.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the generation if absent. Returns true when it was created.
    async fn create_generation(&self, name: &str) -> Result<bool>;

    /// Stores a response under `request_id`, replacing an entry with the
    /// same identifier.
    async fn put(&self, generation: &str, request_id: &str, response: CachedResponse)
        -> Result<()>;

    /// Returns the first stored response matching `request_id`.
    ///
    /// Generations are searched in creation order; within a generation,
    /// entries in insertion order.
    async fn match_any(
        &self,
        request_id: &str,
        options: &MatchOptions,
    ) -> Result<Option<CachedResponse>>;

    /// Lists generation names in creation order.
    async fn list_generations(&self) -> Result<Vec<String>>;

    /// Deletes a generation and all its entries. Returns false if absent.
    async fn delete_generation(&self, name: &str) -> Result<bool>;

    /// Marks a generation as fully populated.
    async fn mark_complete(&self, name: &str) -> Result<()>;

    /// Describes a generation, or None if absent.
    async fn generation_info(&self, name: &str) -> Result<Option<GenerationInfo>>;
}

// == Generation Handle ==
/// An opened generation, created if it did not exist.
#[derive(Clone)]
pub struct GenerationHandle {
    storage: SharedStorage,
    name: String,
    created: bool,
}

impl GenerationHandle {
    /// Opens the named generation, creating it if absent.
    pub async fn open(storage: SharedStorage, name: &str) -> Result<Self> {
        let created = storage.create_generation(name).await?;
        if created {
            debug!("Created cache generation '{}'", name);
        }
        Ok(Self {
            storage,
            name: name.to_string(),
            created,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if this open call created the generation.
    pub fn was_created(&self) -> bool {
        self.created
    }

    // == Put ==
    /// Stores a response, rejecting responses that may not be cached.
    pub async fn put(&self, request_id: &str, response: CachedResponse) -> Result<()> {
        if let Some(reason) = response.unstorable_reason() {
            return Err(AgentError::CacheWrite {
                request_id: request_id.to_string(),
                reason: reason.to_string(),
            });
        }
        self.storage
            .put(&self.name, key::strip_fragment(request_id), response)
            .await
            .map_err(|e| match e {
                AgentError::CacheWrite { .. } => e,
                other => AgentError::CacheWrite {
                    request_id: request_id.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    /// Marks the generation as fully populated.
    pub async fn mark_complete(&self) -> Result<()> {
        self.storage.mark_complete(&self.name).await
    }

    /// Looks up an entry in this generation only.
    pub async fn match_entry(
        &self,
        request_id: &str,
        ignore_query: bool,
    ) -> Result<Option<CachedResponse>> {
        let options = MatchOptions {
            ignore_query,
            generation: Some(self.name.clone()),
        };
        self.storage.match_any(request_id, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;

    #[test]
    fn test_match_scope_parse() {
        assert_eq!("all".parse::<MatchScope>().unwrap(), MatchScope::AllGenerations);
        assert_eq!("Current".parse::<MatchScope>().unwrap(), MatchScope::CurrentOnly);
        assert!("nearest".parse::<MatchScope>().is_err());
    }

    #[test]
    fn test_match_options_relaxed_both_directions() {
        let options = MatchOptions::ignore_query();
        assert!(options.matches("/data", "/data?x=1"));
        assert!(options.matches("/data?x=1", "/data"));
        assert!(options.matches("/data?x=1", "/data?y=2"));
        assert!(!options.matches("/data", "/data2"));
    }

    #[test]
    fn test_match_options_exact() {
        let options = MatchOptions::default();
        assert!(options.matches("/data?x=1", "/data?x=1"));
        assert!(!options.matches("/data", "/data?x=1"));
    }

    #[tokio::test]
    async fn test_handle_open_reports_creation() {
        let storage: SharedStorage = Arc::new(MemoryCacheStore::new());

        let first = GenerationHandle::open(storage.clone(), "v1").await.unwrap();
        let second = GenerationHandle::open(storage, "v1").await.unwrap();

        assert!(first.was_created());
        assert!(!second.was_created());
    }

    #[tokio::test]
    async fn test_handle_rejects_partial_content() {
        let storage: SharedStorage = Arc::new(MemoryCacheStore::new());
        let handle = GenerationHandle::open(storage, "v1").await.unwrap();

        let result = handle.put("/video", CachedResponse::new(206, "part")).await;

        assert!(matches!(result, Err(AgentError::CacheWrite { .. })));
        assert!(handle.match_entry("/video", false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handle_put_drops_fragment() {
        let storage: SharedStorage = Arc::new(MemoryCacheStore::new());
        let handle = GenerationHandle::open(storage, "v1").await.unwrap();

        handle
            .put("/page#intro", CachedResponse::new(200, "page"))
            .await
            .unwrap();

        let found = handle.match_entry("/page", false).await.unwrap();
        assert_eq!(found.unwrap().body, "page");
    }
}
