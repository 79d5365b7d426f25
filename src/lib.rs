//! Cache Agent - an intercepting read-through cache
//!
//! Pre-caches a fixed manifest into a named generation at install time,
//! removes superseded generations on activation, and serves intercepted
//! requests from the cache with a network fallback.

pub mod agent;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;
pub mod transport;

pub use agent::{AgentSettings, CacheAgent, LifecycleState, Manifest};
pub use api::AppState;
pub use config::Config;
pub use error::{AgentError, Result};
pub use tasks::spawn_lifecycle_task;
