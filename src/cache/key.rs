//! Request Key Module
//!
//! Normalization of request identifiers for relaxed matching.

/// Strips the query string and fragment from a request identifier.
///
/// `/data?x=1` and `/data#top` both normalize to `/data`. Absolute URLs keep
/// their scheme and authority.
pub fn strip_query(request_id: &str) -> &str {
    let end = request_id
        .find(|c| c == '?' || c == '#')
        .unwrap_or(request_id.len());
    &request_id[..end]
}

/// Strips only the fragment, which never takes part in matching.
pub fn strip_fragment(request_id: &str) -> &str {
    request_id.split('#').next().unwrap_or(request_id)
}

/// Returns the key two identifiers are compared by.
pub fn match_key(request_id: &str, ignore_query: bool) -> &str {
    if ignore_query {
        strip_query(request_id)
    } else {
        strip_fragment(request_id)
    }
}
