//! API Handlers
//!
//! The lifecycle host: control endpoints for install/activate/inspection and
//! the fallback handler routing every other request through the agent.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::Response,
    Json,
};

use crate::agent::{ActivationReport, CacheAgent, InstallReport, Intercepted};
use crate::cache::MatchOptions;
use crate::error::{AgentError, Result};
use crate::models::{HealthResponse, MatchQuery, MatchResponse, StatsResponse, StatusResponse};
use crate::transport::AgentRequest;

/// Header telling the client how the response was produced.
pub const X_CACHE: &str = "x-cache";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<CacheAgent>,
}

impl AppState {
    pub fn new(agent: CacheAgent) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }

    pub fn from_shared(agent: Arc<CacheAgent>) -> Self {
        Self { agent }
    }
}

/// Fallback handler: every request outside the control prefix.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let request_id = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    let mut request = AgentRequest {
        method,
        request_id,
        headers: Vec::new(),
        body,
    };
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }

    let intercepted = state.agent.on_request(&request).await?;
    into_http_response(intercepted)
}

fn into_http_response(intercepted: Intercepted) -> Result<Response> {
    let Intercepted { response, status } = intercepted;

    let code = StatusCode::from_u16(response.status).map_err(|e| {
        AgentError::Internal(format!("invalid upstream status {}: {}", response.status, e))
    })?;

    let mut builder = axum::http::Response::builder().status(code);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .header(X_CACHE, status.as_str())
        .body(Body::from(response.body))
        .map_err(|e| AgentError::Internal(format!("failed to build response: {}", e)))
}

/// Handler for POST /__agent/install
pub async fn install_handler(State(state): State<AppState>) -> Result<Json<InstallReport>> {
    let report = state.agent.on_install().await?;
    Ok(Json(report))
}

/// Handler for POST /__agent/activate
pub async fn activate_handler(State(state): State<AppState>) -> Result<Json<ActivationReport>> {
    let report = state.agent.on_activate().await?;
    Ok(Json(report))
}

/// Handler for GET /__agent/status
pub async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    let agent = &state.agent;
    let storage = agent.storage();

    let mut generations = Vec::new();
    for name in storage.list_generations().await? {
        // May have been deleted by a concurrent activation.
        if let Some(info) = storage.generation_info(&name).await? {
            generations.push(info);
        }
    }

    Ok(Json(StatusResponse {
        state: agent.state().await.as_str().to_string(),
        generation: agent.generation().to_string(),
        match_scope: agent.match_scope(),
        manifest_size: agent.manifest().len(),
        generations,
    }))
}

/// Handler for GET /__agent/match
///
/// Looks up a request identifier without touching the network.
pub async fn match_handler(
    State(state): State<AppState>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<MatchResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(AgentError::InvalidRequest(error_msg));
    }

    let options = MatchOptions {
        ignore_query: query.ignore_query,
        generation: query.generation.clone(),
    };
    let found = state
        .agent
        .storage()
        .match_any(&query.path, &options)
        .await?
        .ok_or_else(|| AgentError::NotFound(query.path.clone()))?;

    Ok(Json(MatchResponse::new(
        query.path,
        found.status,
        found.header("content-type").map(String::from),
        found.body.len(),
    )))
}

/// Handler for GET /__agent/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.agent.stats().await))
}

/// Handler for GET /__agent/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
