//! HTTP transport backed by reqwest, resolving request identifiers against one origin.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{AgentRequest, Transport, TransportError};
use crate::cache::{key, CachedResponse};
use crate::error::{AgentError, Result};

/// Fetches from a single origin over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    origin: Url,
}

impl HttpTransport {
    /// Creates a transport for `origin` with a per-request timeout.
    pub fn new(origin: &str, timeout: Duration) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| AgentError::InvalidRequest(format!("invalid origin '{}': {}", origin, e)))?;
        if origin.cannot_be_a_base() {
            return Err(AgentError::InvalidRequest(format!(
                "origin '{}' cannot resolve paths",
                origin
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cache_agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolves a request identifier against the origin.
    ///
    /// Only the path and query of the identifier are used; scheme, host and
    /// port always come from the origin.
    pub fn resolve(&self, request_id: &str) -> std::result::Result<Url, TransportError> {
        if !request_id.starts_with('/') {
            return Err(TransportError::InvalidUrl(format!(
                "{}: not an origin-relative path",
                request_id
            )));
        }

        let target = key::strip_fragment(request_id);
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut url = self.origin.clone();
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);
        Ok(url)
    }
}

fn classify(err: reqwest::Error, request_id: &str) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(request_id.to_string())
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(format!("{}: {}", request_id, err))
    } else {
        TransportError::Connect(format!("{}: {}", request_id, err))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        request: &AgentRequest,
    ) -> std::result::Result<CachedResponse, TransportError> {
        let url = self.resolve(&request.request_id)?;
        debug!("Fetching {} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, &request.request_id))?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| classify(e, &request.request_id))?;

        let mut fetched = CachedResponse::new(status, body);
        for (name, value) in headers {
            fetched = fetched.with_header(name, value);
        }
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(origin: &str) -> HttpTransport {
        HttpTransport::new(origin, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_resolve_path_and_query() {
        let t = transport("http://localhost:8000");
        let url = t.resolve("/data/restaurants.json?x=1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/data/restaurants.json?x=1");
    }

    #[test]
    fn test_resolve_root() {
        let t = transport("http://localhost:8000/");
        assert_eq!(t.resolve("/").unwrap().as_str(), "http://localhost:8000/");
    }

    #[test]
    fn test_invalid_origin_rejected() {
        assert!(HttpTransport::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpTransport::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let t = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = t.fetch(&AgentRequest::get("/")).await;
        assert!(matches!(
            result,
            Err(TransportError::Connect(_)) | Err(TransportError::Timeout(_))
        ));
    }

    #[test]
    fn test_resolve_keeps_scheme_relative_path_on_origin() {
        let t = transport("http://localhost:8000");
        let url = t.resolve("//evil.example/steal?x=1").unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(8000));
        assert_eq!(url.path(), "//evil.example/steal");
        assert_eq!(url.query(), Some("x=1"));
    }

    #[test]
    fn test_resolve_rejects_absolute_and_relative_ids() {
        let t = transport("http://localhost:8000");
        assert!(matches!(
            t.resolve("http://evil.example/steal"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(matches!(
            t.resolve("img/1.jpg"),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_resolve_drops_fragment() {
        let t = transport("http://localhost:8000");
        let url = t.resolve("/restaurant.html?id=2#map").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/restaurant.html?id=2");
    }

    #[tokio::test]
    async fn test_fetch_never_leaves_origin() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use axum::{extract::State, routing::get, Router};

        async fn secret(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
            hits.fetch_add(1, Ordering::SeqCst);
            "internal secret"
        }

        let foreign_hits = Arc::new(AtomicUsize::new(0));
        let foreign = Router::new()
            .route("/secret", get(secret))
            .with_state(foreign_hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let foreign_addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, foreign).await.unwrap();
        });

        let t = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = t
            .fetch(&AgentRequest::get(format!("//{}/secret", foreign_addr)))
            .await;

        assert!(result.is_err());
        assert_eq!(foreign_hits.load(Ordering::SeqCst), 0);
    }
}
