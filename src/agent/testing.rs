//! Test doubles for the transport and store seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cache::{
    key, CacheStorage, CachedResponse, GenerationInfo, MatchOptions, MemoryCacheStore,
};
use crate::error::{AgentError, Result};
use crate::transport::{AgentRequest, Transport, TransportError};

/// Scripted network: fixed responses and failures per path, counting fetches.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, std::result::Result<CachedResponse, TransportError>>>,
    /// Unknown paths answer 200 with the path as body instead of failing
    echo_unknown: bool,
    fetches: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echo() -> Self {
        Self {
            echo_unknown: true,
            ..Self::default()
        }
    }

    pub fn serve(&self, path: &str, response: CachedResponse) {
        self.routes.lock().unwrap().insert(path.to_string(), Ok(response));
    }

    pub fn fail(&self, path: &str, error: TransportError) {
        self.routes.lock().unwrap().insert(path.to_string(), Err(error));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(
        &self,
        request: &AgentRequest,
    ) -> std::result::Result<CachedResponse, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let path = key::strip_query(&request.request_id);
        let routed = self.routes.lock().unwrap().get(path).cloned();
        match routed {
            Some(outcome) => outcome,
            None if self.echo_unknown => Ok(CachedResponse::new(200, path.to_string())),
            None => Err(TransportError::Connect(format!("{}: no route", path))),
        }
    }
}

/// A network that accepts requests and never answers.
pub struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn fetch(
        &self,
        _request: &AgentRequest,
    ) -> std::result::Result<CachedResponse, TransportError> {
        std::future::pending().await
    }
}

/// A transport serving every path with its own name.
pub fn site_transport() -> Arc<MockTransport> {
    Arc::new(MockTransport::echo())
}

/// Memory store that fails selected operations.
pub struct FailingStorage {
    inner: MemoryCacheStore,
    fail_puts: bool,
    fail_delete: Option<String>,
}

impl FailingStorage {
    pub fn failing_puts() -> Self {
        Self {
            inner: MemoryCacheStore::new(),
            fail_puts: true,
            fail_delete: None,
        }
    }

    pub fn failing_delete_of(name: &str) -> Self {
        Self {
            inner: MemoryCacheStore::new(),
            fail_puts: false,
            fail_delete: Some(name.to_string()),
        }
    }
}

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn create_generation(&self, name: &str) -> Result<bool> {
        self.inner.create_generation(name).await
    }

    async fn put(
        &self,
        generation: &str,
        request_id: &str,
        response: CachedResponse,
    ) -> Result<()> {
        if self.fail_puts {
            return Err(AgentError::Storage("disk full".to_string()));
        }
        self.inner.put(generation, request_id, response).await
    }

    async fn match_any(
        &self,
        request_id: &str,
        options: &MatchOptions,
    ) -> Result<Option<CachedResponse>> {
        self.inner.match_any(request_id, options).await
    }

    async fn list_generations(&self) -> Result<Vec<String>> {
        self.inner.list_generations().await
    }

    async fn delete_generation(&self, name: &str) -> Result<bool> {
        if self.fail_delete.as_deref() == Some(name) {
            return Err(AgentError::Storage("permission denied".to_string()));
        }
        self.inner.delete_generation(name).await
    }

    async fn mark_complete(&self, name: &str) -> Result<()> {
        self.inner.mark_complete(name).await
    }

    async fn generation_info(&self, name: &str) -> Result<Option<GenerationInfo>> {
        self.inner.generation_info(name).await
    }
}
