//! Cache Agent - an intercepting read-through cache
//!
//! Runs the agent behind an HTTP lifecycle host in front of one origin.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_agent::api::create_router;
use cache_agent::cache::{DiskCacheStore, MemoryCacheStore, SharedStorage};
use cache_agent::transport::HttpTransport;
use cache_agent::{spawn_lifecycle_task, AgentSettings, AppState, CacheAgent, Config};

/// Main entry point for the cache agent.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the cache store (disk or memory) and the HTTP transport
/// 4. Restore a complete generation left by a previous run
/// 5. Spawn the install/activate lifecycle task
/// 6. Serve the lifecycle host until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_agent=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cache agent");

    let config = Config::from_env();
    info!(
        "Configuration loaded: generation={}, origin={}, port={}, manifest={} entries, scope={}",
        config.generation,
        config.origin_url,
        config.server_port,
        config.manifest.len(),
        config.match_scope
    );

    let storage: SharedStorage = match &config.cache_dir {
        Some(dir) => {
            let store = DiskCacheStore::open(dir)
                .await
                .with_context(|| format!("opening cache directory {}", dir.display()))?;
            info!("Using disk cache store at {}", dir.display());
            Arc::new(store)
        }
        None => {
            info!("Using in-memory cache store");
            Arc::new(MemoryCacheStore::new())
        }
    };

    let transport = HttpTransport::new(
        &config.origin_url,
        Duration::from_secs(config.fetch_timeout),
    )
    .context("configuring network transport")?;

    let settings = AgentSettings::from_config(&config).context("invalid agent configuration")?;
    let agent = Arc::new(CacheAgent::new(settings, storage, Arc::new(transport)));

    let restored = agent.restore().await.context("reading cache store")?;
    info!("Agent state at startup: {}", restored.as_str());

    let lifecycle_handle = if config.auto_lifecycle {
        Some(spawn_lifecycle_task(agent.clone()))
    } else {
        info!("Automatic lifecycle disabled; waiting for /__agent/install");
        None
    };

    let app = create_router(AppState::from_shared(agent));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(lifecycle_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts a still-running lifecycle task.
async fn shutdown_signal(lifecycle_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = lifecycle_handle {
        if !handle.is_finished() {
            handle.abort();
            warn!("Lifecycle task aborted");
        }
    }
}
