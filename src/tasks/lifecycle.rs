//! Startup Lifecycle Task
//!
//! Background task delivering the install and activate signals once at startup.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::agent::{CacheAgent, LifecycleState};

/// Spawns a task that installs and then activates the current generation.
///
/// An install failure is logged and activation is skipped, leaving the agent
/// passing requests through to the network (or serving a previously
/// restored generation).
///
/// # Returns
/// A JoinHandle for the spawned task, which can be aborted during shutdown.
pub fn spawn_lifecycle_task(agent: Arc<CacheAgent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match agent.on_install().await {
            Ok(report) => info!(
                "Startup install complete: {} resources in '{}'",
                report.cached, report.generation
            ),
            Err(e) => {
                error!("Startup install failed: {}", e);
                return;
            }
        }

        match agent.on_activate().await {
            Ok(report) if report.failed.is_empty() => {
                info!("Startup activation complete");
            }
            Ok(report) => warn!(
                "Startup activation left {} stale generations behind",
                report.failed.len()
            ),
            Err(e) => error!("Startup activation failed: {}", e),
        }

        if agent.state().await != LifecycleState::Activated {
            warn!("Agent is not intercepting requests");
        }
    })
}
