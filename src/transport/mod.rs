//! Network Transport Module
//!
//! The `fetch(request) -> response | error` capability the agent falls back to.

mod http;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use thiserror::Error;

use crate::cache::{is_hop_by_hop, CachedResponse};

pub use http::HttpTransport;

/// Shared, thread-safe transport handle.
pub type SharedTransport = Arc<dyn Transport>;

// == Transport Error ==
/// Failure to obtain a response from the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset
    #[error("Network error: {0}")]
    Connect(String),

    #[error("Network timeout: {0}")]
    Timeout(String),

    /// The request identifier does not resolve against the origin
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),
}

// == Agent Request ==
/// A request handed to the agent by its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub method: Method,
    /// Path and query relative to the origin, e.g. `/data/restaurants.json?x=1`
    pub request_id: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl AgentRequest {
    /// A bodiless GET request.
    pub fn get(request_id: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            request_id: request_id.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header, dropping hop-by-hop and `host` headers.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if !is_hop_by_hop(&name) && !name.eq_ignore_ascii_case("host") {
            self.headers.push((name, value.into()));
        }
        self
    }

    /// Only GET requests take part in caching.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }
}

// == Transport Trait ==
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the request against the network.
    ///
    /// HTTP error statuses are responses, not errors.
    async fn fetch(&self, request: &AgentRequest) -> Result<CachedResponse, TransportError>;
}
