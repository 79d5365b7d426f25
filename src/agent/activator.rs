//! Activator
//!
//! Deletes every generation other than the current one.

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::SharedStorage;
use crate::error::{AgentError, Result};

/// A stale generation that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub name: String,
    pub reason: String,
}

impl From<DeleteFailure> for AgentError {
    fn from(failure: DeleteFailure) -> Self {
        AgentError::ActivationDelete {
            name: failure.name,
            reason: failure.reason,
        }
    }
}

/// Outcome of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub generation: String,
    pub deleted: Vec<String>,
    /// Left in place; retried on the next activation
    pub failed: Vec<DeleteFailure>,
}

/// Removes superseded generations.
pub struct Activator {
    generation: String,
    storage: SharedStorage,
}

impl Activator {
    pub fn new(generation: impl Into<String>, storage: SharedStorage) -> Self {
        Self {
            generation: generation.into(),
            storage,
        }
    }

    // == Activate ==
    /// Deletes all stale generations concurrently and waits for every deletion.
    ///
    /// A failed deletion is logged and reported but does not fail the
    /// activation. Only failing to list generations is an error.
    pub async fn activate(&self) -> Result<ActivationReport> {
        let names = self.storage.list_generations().await?;
        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| *name != self.generation)
            .collect();

        let outcomes = join_all(stale.into_iter().map(|name| async move {
            info!("Removing stale generation '{}'", name);
            let outcome = self.storage.delete_generation(&name).await;
            (name, outcome)
        }))
        .await;

        let mut report = ActivationReport {
            generation: self.generation.clone(),
            ..ActivationReport::default()
        };

        for (name, outcome) in outcomes {
            match outcome {
                Ok(true) => report.deleted.push(name),
                // Removed concurrently by another activation.
                Ok(false) => {}
                Err(e) => {
                    let failure = DeleteFailure {
                        name,
                        reason: e.to_string(),
                    };
                    warn!("{}", AgentError::from(failure.clone()));
                    report.failed.push(failure);
                }
            }
        }

        info!(
            "Activated generation '{}': {} removed, {} failed",
            self.generation,
            report.deleted.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
