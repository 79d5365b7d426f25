//! Memory Store Module
//!
//! In-memory cache storage holding generations in creation order.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{
    key, CacheEntry, CacheStorage, CachedResponse, GenerationInfo, MatchOptions,
};
use crate::error::{AgentError, Result};

// == Generation ==
/// One named generation.
///
/// Entries are bucketed by their query-stripped identifier; each bucket
/// keeps its query variants in insertion order.
#[derive(Debug, Default)]
struct Generation {
    name: String,
    buckets: HashMap<String, Vec<CacheEntry>>,
    complete: bool,
}

impl Generation {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn put(&mut self, request_id: &str, response: CachedResponse) {
        let bucket = self
            .buckets
            .entry(key::strip_query(request_id).to_string())
            .or_default();

        match bucket.iter_mut().find(|e| e.request_id == request_id) {
            Some(existing) => *existing = CacheEntry::new(request_id, response),
            None => bucket.push(CacheEntry::new(request_id, response)),
        }
    }

    fn find(&self, request_id: &str, options: &MatchOptions) -> Option<&CacheEntry> {
        self.buckets
            .get(key::strip_query(request_id))?
            .iter()
            .find(|e| options.matches(&e.request_id, request_id))
    }

    fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

// == Memory Cache Store ==
/// Cache storage kept entirely in memory.
///
/// A single store-wide lock guards all generations; entries are swapped in
/// whole, so readers never see a partial write.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    generations: RwLock<Vec<Generation>>,
}

impl MemoryCacheStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all generations.
    pub async fn len(&self) -> usize {
        self.generations.read().await.iter().map(Generation::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStore {
    async fn create_generation(&self, name: &str) -> Result<bool> {
        let mut generations = self.generations.write().await;
        if generations.iter().any(|g| g.name == name) {
            return Ok(false);
        }
        generations.push(Generation::new(name));
        Ok(true)
    }

    async fn put(
        &self,
        generation: &str,
        request_id: &str,
        response: CachedResponse,
    ) -> Result<()> {
        let mut generations = self.generations.write().await;
        let target = generations
            .iter_mut()
            .find(|g| g.name == generation)
            .ok_or_else(|| AgentError::NotFound(format!("generation '{}'", generation)))?;
        target.put(request_id, response);
        Ok(())
    }

    async fn match_any(
        &self,
        request_id: &str,
        options: &MatchOptions,
    ) -> Result<Option<CachedResponse>> {
        let generations = self.generations.read().await;
        let found = generations
            .iter()
            .filter(|g| options.generation.as_deref().map_or(true, |n| n == g.name))
            .find_map(|g| g.find(request_id, options))
            .map(|e| e.response.clone());
        Ok(found)
    }

    async fn list_generations(&self) -> Result<Vec<String>> {
        let generations = self.generations.read().await;
        Ok(generations.iter().map(|g| g.name.clone()).collect())
    }

    async fn delete_generation(&self, name: &str) -> Result<bool> {
        let mut generations = self.generations.write().await;
        let before = generations.len();
        generations.retain(|g| g.name != name);
        Ok(generations.len() != before)
    }

    async fn mark_complete(&self, name: &str) -> Result<()> {
        let mut generations = self.generations.write().await;
        let target = generations
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| AgentError::NotFound(format!("generation '{}'", name)))?;
        target.complete = true;
        Ok(())
    }

    async fn generation_info(&self, name: &str) -> Result<Option<GenerationInfo>> {
        let generations = self.generations.read().await;
        Ok(generations.iter().find(|g| g.name == name).map(|g| GenerationInfo {
            name: g.name.clone(),
            entries: g.len(),
            complete: g.complete,
        }))
    }
}
