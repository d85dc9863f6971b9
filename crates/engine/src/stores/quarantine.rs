//! Quarantine for entities orphaned by a failed migration.
//!
//! An entity lands here when it was detached from its source world, the
//! destination refused it, and returning it to the source failed too. Its
//! state is still held by its handle; an operator can put it back into any
//! world with [`QuarantineStore::restore_into`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use multiworld_domain::EntityId;

use crate::entities::{EntityHandle, SpawnError};
use crate::infrastructure::ports::ClockPort;
use crate::infrastructure::world_runtime::WorldHandle;

/// An orphaned entity waiting for manual recovery.
#[derive(Debug, Clone)]
pub struct QuarantinedEntity {
    pub handle: EntityHandle,
    pub source_world: String,
    pub failed_destination: String,
    pub reason: String,
    pub quarantined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestoreError {
    #[error("Entity {0} is not quarantined")]
    NotQuarantined(EntityId),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// In-memory quarantine keyed by entity.
pub struct QuarantineStore {
    entries: DashMap<EntityId, QuarantinedEntity>,
    clock: Arc<dyn ClockPort>,
}

impl QuarantineStore {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Record an orphaned entity. Replaces any previous record for it.
    pub fn hold(
        &self,
        handle: EntityHandle,
        source_world: impl Into<String>,
        failed_destination: impl Into<String>,
        reason: impl Into<String>,
    ) {
        let record = QuarantinedEntity {
            source_world: source_world.into(),
            failed_destination: failed_destination.into(),
            reason: reason.into(),
            quarantined_at: self.clock.now(),
            handle,
        };
        tracing::error!(
            entity_id = %record.handle.id(),
            entity = %record.handle.name(),
            source_world = %record.source_world,
            failed_destination = %record.failed_destination,
            reason = %record.reason,
            "Entity quarantined: resident in no world"
        );
        self.entries.insert(record.handle.id(), record);
    }

    pub fn get(&self, id: EntityId) -> Option<QuarantinedEntity> {
        self.entries.get(&id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// All quarantined entities, oldest first.
    pub fn list(&self) -> Vec<QuarantinedEntity> {
        let mut records: Vec<QuarantinedEntity> =
            self.entries.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.quarantined_at);
        records
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove a record and hand it to the caller.
    pub fn release(&self, id: EntityId) -> Option<QuarantinedEntity> {
        self.entries.remove(&id).map(|(_, record)| record)
    }

    /// Place a quarantined entity into `world`. The record is kept if the
    /// world refuses it.
    pub async fn restore_into(&self, id: EntityId, world: &WorldHandle) -> Result<(), RestoreError> {
        let record = self.release(id).ok_or(RestoreError::NotQuarantined(id))?;
        match record.handle.spawn_into(world).await {
            Ok(()) => {
                tracing::info!(
                    entity_id = %id,
                    world = %world.name(),
                    "Quarantined entity restored"
                );
                Ok(())
            }
            Err(e) => {
                self.entries.insert(id, record);
                Err(e.into())
            }
        }
    }
}
