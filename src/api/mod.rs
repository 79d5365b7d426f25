//! API Module
//!
//! HTTP lifecycle host for the cache agent.
//!
//! # Endpoints
//! - `POST /__agent/install` - Pre-cache the manifest
//! - `POST /__agent/activate` - Remove stale generations and start intercepting
//! - `GET /__agent/status` - Lifecycle state and generations
//! - `GET /__agent/match` - Inspect a cache lookup
//! - `GET /__agent/stats` - Interception statistics
//! - `GET /__agent/health` - Health check endpoint
//! - any other path - intercepted and served from cache or network

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, CONTROL_PREFIX};
