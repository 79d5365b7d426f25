//! Interceptor
//!
//! Read-through request handling: serve from the cache, otherwise fetch,
//! store a copy in the current generation and return the original.

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{
    AgentStats, CachedResponse, GenerationHandle, MatchOptions, MatchScope, SharedStorage,
};
use crate::error::Result;
use crate::transport::{AgentRequest, SharedTransport};

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the cache without network access
    Hit,
    /// Fetched from the network after a failed lookup
    Miss,
    /// Sent straight to the network without a lookup
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Bypass => "bypass",
        }
    }
}

/// A response and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intercepted {
    pub response: CachedResponse,
    pub status: CacheStatus,
}

/// Answers requests from the cache, falling back to the network.
pub struct Interceptor {
    generation: String,
    scope: MatchScope,
    storage: SharedStorage,
    transport: SharedTransport,
    stats: RwLock<AgentStats>,
}

impl Interceptor {
    pub fn new(
        generation: impl Into<String>,
        scope: MatchScope,
        storage: SharedStorage,
        transport: SharedTransport,
    ) -> Self {
        Self {
            generation: generation.into(),
            scope,
            storage,
            transport,
            stats: RwLock::new(AgentStats::new()),
        }
    }

    pub fn scope(&self) -> MatchScope {
        self.scope
    }

    pub async fn stats(&self) -> AgentStats {
        self.stats.read().await.clone()
    }

    /// Lookup options for this interceptor's scope.
    pub fn match_options(&self) -> MatchOptions {
        match self.scope {
            MatchScope::AllGenerations => MatchOptions::ignore_query(),
            MatchScope::CurrentOnly => MatchOptions::ignore_query().in_generation(&self.generation),
        }
    }

    // == Handle ==
    /// Intercepts one request.
    ///
    /// Non-GET requests bypass the cache. A network failure on a miss is
    /// returned unchanged and nothing is stored; a failure to store a
    /// fetched response is logged and the response is still returned.
    pub async fn handle(&self, request: &AgentRequest) -> Result<Intercepted> {
        if !request.is_cacheable() {
            return self.pass_through(request).await;
        }

        let cached = match self
            .storage
            .match_any(&request.request_id, &self.match_options())
            .await
        {
            Ok(cached) => cached,
            Err(e) => {
                // An unreadable store is treated as a miss.
                warn!("Cache lookup failed for {}: {}", request.request_id, e);
                None
            }
        };

        if let Some(response) = cached {
            debug!("Cache hit: {}", request.request_id);
            self.stats.write().await.record_hit();
            return Ok(Intercepted {
                response,
                status: CacheStatus::Hit,
            });
        }

        debug!("Cache miss: {}", request.request_id);
        self.stats.write().await.record_miss();

        let response = self.fetch(request).await?;
        self.store(&request.request_id, response.clone()).await;

        Ok(Intercepted {
            response,
            status: CacheStatus::Miss,
        })
    }

    /// Forwards a request without touching the cache.
    pub async fn pass_through(&self, request: &AgentRequest) -> Result<Intercepted> {
        self.stats.write().await.record_bypass();
        let response = self.fetch(request).await?;
        Ok(Intercepted {
            response,
            status: CacheStatus::Bypass,
        })
    }

    async fn fetch(&self, request: &AgentRequest) -> Result<CachedResponse> {
        self.stats.write().await.record_fetch();
        match self.transport.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                self.stats.write().await.record_network_failure();
                warn!("Network fetch failed for {}: {}", request.request_id, e);
                Err(e.into())
            }
        }
    }

    async fn store(&self, request_id: &str, response: CachedResponse) {
        let written: Result<()> = async {
            let handle = GenerationHandle::open(self.storage.clone(), &self.generation).await?;
            handle.put(request_id, response).await
        }
        .await;

        if let Err(e) = written {
            self.stats.write().await.record_write_failure();
            warn!("{}", e);
        }
    }
}
