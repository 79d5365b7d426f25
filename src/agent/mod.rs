//! Agent Module
//!
//! The three lifecycle entry points (install, activate, intercept) and the
//! [`CacheAgent`] that sequences them for a host.

mod activator;
mod installer;
mod interceptor;
mod manifest;

#[cfg(test)]
mod testing;

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub use activator::{ActivationReport, Activator, DeleteFailure};
pub use installer::{InstallReport, Installer};
pub use interceptor::{CacheStatus, Intercepted, Interceptor};
pub use manifest::Manifest;

use crate::cache::{AgentStats, MatchScope, SharedStorage};
use crate::config::Config;
use crate::error::{AgentError, Result};
use crate::transport::{AgentRequest, SharedTransport};

// == Lifecycle State ==
/// Where the agent is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Constructed, not yet installed
    Parsed,
    Installing,
    /// Current generation complete, waiting for activation
    Installed,
    Activating,
    /// Intercepting requests
    Activated,
    /// Install failed; requests pass straight to the network
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

// == Agent Settings ==
/// Construction-time configuration shared by the three components.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Current generation identifier
    pub generation: String,
    pub manifest: Manifest,
    pub match_scope: MatchScope,
}

impl AgentSettings {
    pub fn new(generation: impl Into<String>, manifest: Manifest) -> Self {
        Self {
            generation: generation.into(),
            manifest,
            match_scope: MatchScope::AllGenerations,
        }
    }

    pub fn with_match_scope(mut self, scope: MatchScope) -> Self {
        self.match_scope = scope;
        self
    }

    /// Builds settings from configuration, validating the manifest.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.generation.is_empty() {
            return Err(AgentError::InvalidRequest(
                "generation name cannot be empty".to_string(),
            ));
        }
        Ok(Self::new(
            config.generation.clone(),
            Manifest::new(config.manifest.iter().cloned())?,
        )
        .with_match_scope(config.match_scope))
    }
}

// == Cache Agent ==
/// Lifecycle host adapter: routes install, activate and request signals to
/// the installer, activator and interceptor.
pub struct CacheAgent {
    generation: String,
    storage: SharedStorage,
    installer: Installer,
    activator: Activator,
    interceptor: Interceptor,
    state: RwLock<LifecycleState>,
    /// Set by the first successful activation; stays set through reinstalls
    intercepting: AtomicBool,
}

impl CacheAgent {
    pub fn new(settings: AgentSettings, storage: SharedStorage, transport: SharedTransport) -> Self {
        let AgentSettings {
            generation,
            manifest,
            match_scope,
        } = settings;

        Self {
            installer: Installer::new(
                generation.clone(),
                manifest,
                storage.clone(),
                transport.clone(),
            ),
            activator: Activator::new(generation.clone(), storage.clone()),
            interceptor: Interceptor::new(generation.clone(), match_scope, storage.clone(), transport),
            generation,
            storage,
            state: RwLock::new(LifecycleState::Parsed),
            intercepting: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn manifest(&self) -> &Manifest {
        self.installer.manifest()
    }

    pub fn match_scope(&self) -> MatchScope {
        self.interceptor.scope()
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub async fn stats(&self) -> AgentStats {
        self.interceptor.stats().await
    }

    // == Restore ==
    /// Resumes as activated when storage already holds a complete current
    /// generation from an earlier run.
    pub async fn restore(&self) -> Result<LifecycleState> {
        let complete = self
            .storage
            .generation_info(&self.generation)
            .await?
            .map_or(false, |info| info.complete);

        let mut state = self.state.write().await;
        if complete && *state == LifecycleState::Parsed {
            info!("Restored complete generation '{}'", self.generation);
            *state = LifecycleState::Activated;
            self.intercepting.store(true, Ordering::SeqCst);
        }
        Ok(*state)
    }

    // == Install ==
    /// Handles the install signal.
    ///
    /// On failure the agent becomes redundant: the new generation is never
    /// activated and requests pass through to the network.
    pub async fn on_install(&self) -> Result<InstallReport> {
        let previous = self.transition(
            &[
                LifecycleState::Parsed,
                LifecycleState::Installed,
                LifecycleState::Activated,
                LifecycleState::Redundant,
            ],
            LifecycleState::Installing,
        )
        .await?;

        match self.installer.install().await {
            Ok(report) => {
                // Reinstalling an active generation keeps it active.
                let next = if previous == LifecycleState::Activated {
                    LifecycleState::Activated
                } else {
                    LifecycleState::Installed
                };
                *self.state.write().await = next;
                Ok(report)
            }
            Err(e) => {
                warn!("Install of generation '{}' failed: {}", self.generation, e);
                let next = if previous == LifecycleState::Activated {
                    LifecycleState::Activated
                } else {
                    LifecycleState::Redundant
                };
                *self.state.write().await = next;
                Err(e)
            }
        }
    }

    // == Activate ==
    /// Handles the activate signal. Requires a successful install.
    pub async fn on_activate(&self) -> Result<ActivationReport> {
        let previous = self.transition(
            &[LifecycleState::Installed, LifecycleState::Activated],
            LifecycleState::Activating,
        )
        .await?;

        match self.activator.activate().await {
            Ok(report) => {
                *self.state.write().await = LifecycleState::Activated;
                self.intercepting.store(true, Ordering::SeqCst);
                Ok(report)
            }
            Err(e) => {
                *self.state.write().await = previous;
                Err(e)
            }
        }
    }

    // == Request ==
    /// Handles one request. Until the first activation, requests are not
    /// intercepted.
    pub async fn on_request(&self, request: &AgentRequest) -> Result<Intercepted> {
        if !self.intercepting.load(Ordering::SeqCst) {
            return self.interceptor.pass_through(request).await;
        }
        self.interceptor.handle(request).await
    }

    async fn transition(
        &self,
        allowed: &[LifecycleState],
        next: LifecycleState,
    ) -> Result<LifecycleState> {
        let mut state = self.state.write().await;
        let previous = *state;
        if !allowed.contains(&previous) {
            return Err(AgentError::InvalidState(format!(
                "cannot move from {} to {}",
                previous.as_str(),
                next.as_str()
            )));
        }
        *state = next;
        Ok(previous)
    }
}
