//! World lookup and storage ports.

use async_trait::async_trait;

use super::error::StorageError;
use crate::infrastructure::world_runtime::{WorldHandle, WorldSettings};

// =============================================================================
// World Lookup
// =============================================================================

/// Resolves world names to running worlds.
///
/// The registry is the production implementation; tests substitute an
/// in-memory mapping or a mock without touching the migration code.
#[cfg_attr(test, mockall::automock)]
pub trait WorldProvider: Send + Sync {
    /// Look up a running world by name. Pure lookup, no side effects.
    fn get_world(&self, name: &str) -> Option<WorldHandle>;

    /// Snapshot of all known world names.
    fn world_names(&self) -> Vec<String>;
}

// =============================================================================
// World Storage
// =============================================================================

/// Persistent world storage, consulted once at startup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldStorage: Send + Sync {
    /// Make sure the storage location exists, creating it if needed.
    async fn ensure_root(&self) -> Result<(), StorageError>;

    /// Names of all persisted worlds.
    async fn list_worlds(&self) -> Result<Vec<String>, StorageError>;

    /// Open one persisted world and read its settings.
    async fn open_world(&self, name: &str) -> Result<WorldSettings, StorageError>;
}
