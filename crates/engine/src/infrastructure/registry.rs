//! World registry - name to running world.
//!
//! Built once at startup and shared by reference (`Arc`) with everything that
//! resolves worlds. Reads are lock-free per shard, so command handlers can
//! look worlds up while migrations are running.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::infrastructure::ports::WorldProvider;
use crate::infrastructure::world_runtime::WorldHandle;

/// Errors from registering a world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("World already registered: {0}")]
    AlreadyExists(String),
}

/// Concurrent map of running worlds keyed by name.
#[derive(Default)]
pub struct WorldRegistry {
    worlds: DashMap<String, WorldHandle>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a world under its own name.
    ///
    /// # Errors
    ///
    /// `RegistryError::AlreadyExists` if the name is taken; the existing
    /// world is left in place.
    pub fn register(&self, world: WorldHandle) -> Result<(), RegistryError> {
        let name = world.name().to_string();
        match self.worlds.entry(name) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(world = %entry.key(), world_id = %world.id(), "World registered");
                entry.insert(world);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, name: &str) -> Option<WorldHandle> {
        self.worlds.get(name).map(|w| w.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.worlds.contains_key(name)
    }

    /// Registered names, sorted. The result is a snapshot; no lock is held
    /// once it is returned.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.worlds.iter().map(|w| w.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Snapshot of all registered worlds, sorted by name.
    pub fn worlds(&self) -> Vec<WorldHandle> {
        let mut worlds: Vec<WorldHandle> = self.worlds.iter().map(|w| w.value().clone()).collect();
        worlds.sort_by(|a, b| a.name().cmp(b.name()));
        worlds
    }
}

impl WorldProvider for WorldRegistry {
    fn get_world(&self, name: &str) -> Option<WorldHandle> {
        self.resolve(name)
    }

    fn world_names(&self) -> Vec<String> {
        self.names()
    }
}
