//! Entity modules wrapping domain state with runtime behaviour.

mod entity_handle;

pub use entity_handle::{DetachError, Detached, EntityHandle, MigrationGuard, SpawnError};
