//! Installer
//!
//! Populates the current generation with every manifest resource, or nothing.

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::Manifest;
use crate::cache::{CachedResponse, GenerationHandle, SharedStorage};
use crate::error::{AgentError, Result};
use crate::transport::{AgentRequest, SharedTransport};

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: String,
    /// Number of manifest entries stored
    pub cached: usize,
    /// False when the generation already existed
    pub created: bool,
}

/// Pre-caches the manifest into one named generation.
pub struct Installer {
    generation: String,
    manifest: Manifest,
    storage: SharedStorage,
    transport: SharedTransport,
}

impl Installer {
    pub fn new(
        generation: impl Into<String>,
        manifest: Manifest,
        storage: SharedStorage,
        transport: SharedTransport,
    ) -> Self {
        Self {
            generation: generation.into(),
            manifest,
            storage,
            transport,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    // == Install ==
    /// Fetches every manifest resource concurrently, then stores them all.
    ///
    /// Nothing is written unless every fetch returned a 2xx response. If a
    /// write fails part-way, a generation created by this call is removed
    /// again; the generation is marked complete only after the last write.
    pub async fn install(&self) -> Result<InstallReport> {
        info!(
            "Installing generation '{}' ({} resources)",
            self.generation,
            self.manifest.len()
        );

        let fetched = try_join_all(
            self.manifest
                .entries()
                .iter()
                .map(|resource| self.fetch_resource(resource)),
        )
        .await?;

        let handle = GenerationHandle::open(self.storage.clone(), &self.generation).await?;

        for (resource, response) in fetched {
            if let Err(e) = handle.put(&resource, response).await {
                self.roll_back(&handle).await;
                return Err(e);
            }
        }

        if let Err(e) = handle.mark_complete().await {
            self.roll_back(&handle).await;
            return Err(e);
        }

        info!(
            "Installed generation '{}' with {} resources",
            self.generation,
            self.manifest.len()
        );

        Ok(InstallReport {
            generation: self.generation.clone(),
            cached: self.manifest.len(),
            created: handle.was_created(),
        })
    }

    async fn fetch_resource(&self, resource: &str) -> Result<(String, CachedResponse)> {
        let response = self
            .transport
            .fetch(&AgentRequest::get(resource))
            .await
            .map_err(|e| AgentError::InstallFetch {
                resource: resource.to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(AgentError::InstallFetch {
                resource: resource.to_string(),
                reason: format!("HTTP status {}", response.status),
            });
        }

        debug!("Fetched manifest resource {}", resource);
        Ok((resource.to_string(), response))
    }

    async fn roll_back(&self, handle: &GenerationHandle) {
        if !handle.was_created() {
            return;
        }
        match self.storage.delete_generation(handle.name()).await {
            Ok(_) => warn!("Rolled back partially written generation '{}'", handle.name()),
            Err(e) => warn!(
                "Failed to roll back generation '{}': {}",
                handle.name(),
                e
            ),
        }
    }
}
