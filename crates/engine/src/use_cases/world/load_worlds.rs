//! Load worlds use case.
//!
//! Opens every persisted world at startup, spawns its runtime and registers
//! it under its directory name (trimmed). Per-world problems are skipped with a
//! warning; only losing the storage root is fatal.

use std::sync::Arc;

use multiworld_domain::WorldName;

use crate::infrastructure::ports::{StorageError, WorldStorage};
use crate::infrastructure::registry::{RegistryError, WorldRegistry};
use crate::infrastructure::world_runtime::WorldHandle;

#[derive(Debug, thiserror::Error)]
pub enum LoadWorldsError {
    #[error("World storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

/// Why a persisted world was not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    InvalidName(String),
    OpenFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedWorld {
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of a load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Names registered by this pass, in load order
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedWorld>,
}

pub struct LoadWorlds {
    storage: Arc<dyn WorldStorage>,
}

impl LoadWorlds {
    pub fn new(storage: Arc<dyn WorldStorage>) -> Self {
        Self { storage }
    }

    pub async fn execute(&self, registry: &WorldRegistry) -> Result<LoadSummary, LoadWorldsError> {
        self.storage.ensure_root().await?;
        let names = self.storage.list_worlds().await?;

        let mut summary = LoadSummary::default();
        for raw in names {
            let name = match WorldName::new(raw.as_str()) {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(world = %raw, error = %e, "Invalid world name, skipping");
                    summary.skip(raw, SkipReason::InvalidName(e.to_string()));
                    continue;
                }
            };
            let key = name.as_str().to_string();

            if registry.contains(&key) {
                tracing::warn!(world = %key, "Duplicate world name, skipping");
                summary.skip(key, SkipReason::Duplicate);
                continue;
            }

            // Storage is addressed by the directory name as listed.
            let settings = match self.storage.open_world(&raw).await {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(world = %key, error = %e, "Failed to open world, skipping");
                    summary.skip(key, SkipReason::OpenFailed(e.to_string()));
                    continue;
                }
            };

            let world = WorldHandle::spawn(name, settings);
            match registry.register(world.clone()) {
                Ok(()) => {
                    tracing::info!(world = %key, world_id = %world.id(), "World {} loaded", key);
                    summary.loaded.push(key);
                }
                Err(RegistryError::AlreadyExists(_)) => {
                    // Lost a race with a concurrent registration.
                    world.close();
                    tracing::warn!(world = %key, "Duplicate world name, skipping");
                    summary.skip(key, SkipReason::Duplicate);
                }
            }
        }

        tracing::info!(
            loaded = summary.loaded.len(),
            skipped = summary.skipped.len(),
            "World load complete"
        );
        Ok(summary)
    }
}

impl LoadSummary {
    fn skip(&mut self, name: String, reason: SkipReason) {
        self.skipped.push(SkippedWorld { name, reason });
    }
}
