//! Cache Entry Module
//!
//! Defines the stored response and the entry pairing it with its request identifier.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Headers that describe a single connection and are never stored or replayed.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Returns true for headers that must not be stored or forwarded.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

// == Cached Response ==
/// A fully buffered response: status, headers and body.
///
/// The body is a [`Bytes`] buffer, so cloning a response to store one copy
/// and hand the other to the caller shares the allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
}

impl CachedResponse {
    // == Constructor ==
    /// Creates a response with the given status and body and no headers.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a header, dropping hop-by-hop headers.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if !is_hop_by_hop(&name) {
            self.headers.push((name, value.into()));
        }
        self
    }

    /// Returns the first value of a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    // == Storability ==
    /// Returns the reason this response may not be stored, if any.
    ///
    /// Partial content and `Vary: *` responses are rejected.
    pub fn unstorable_reason(&self) -> Option<&'static str> {
        if self.status == 206 {
            return Some("partial content responses are not cacheable");
        }
        let vary_any = self
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("vary"))
            .any(|(_, v)| v.split(',').any(|part| part.trim() == "*"));
        if vary_any {
            return Some("responses with Vary: * are not cacheable");
        }
        None
    }
}

// == Cache Entry ==
/// A stored request identifier and its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The request identifier exactly as it was stored (query included)
    pub request_id: String,
    /// The stored response
    pub response: CachedResponse,
    /// When the entry was written
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    pub fn new(request_id: impl Into<String>, response: CachedResponse) -> Self {
        Self {
            request_id: request_id.into(),
            response,
            stored_at: Utc::now(),
        }
    }
}
