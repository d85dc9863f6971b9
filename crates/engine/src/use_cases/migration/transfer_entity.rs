//! Transfer entity use case.
//!
//! Moves an entity from the world it lives in to another world:
//!
//! 1. Resolve the destination by name (no state touched on failure).
//! 2. Claim the entity's migration token (one migration per entity).
//! 3. Detach: one unit of work on the source world removes the entity and
//!    leaves its state in the handle.
//! 4. Attach: one unit of work on the destination adds the entity and applies
//!    the target position before the unit of work ends.
//!
//! Detach commits strictly before attach is submitted. There is no rollback
//! of a committed detach; when attach fails the entity is returned to its
//! source world, or quarantined if that fails as well.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use multiworld_domain::{EntityId, Position};

use crate::entities::{Detached, EntityHandle};
use crate::infrastructure::ports::WorldProvider;
use crate::stores::QuarantineStore;

/// Bounds on each migration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Longest wait for a world to start the detach or attach unit of work
    pub phase_timeout: Duration,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            phase_timeout: Duration::from_secs(5),
        }
    }
}

/// What happened to an entity whose attach failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-attached to the world it came from, at its old position
    ReturnedToSource,
    /// Held in the quarantine store for manual recovery
    Quarantined,
    /// The handle was closed mid-flight; the state was dropped
    Discarded,
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recovery::ReturnedToSource => write!(f, "returned to source world"),
            Recovery::Quarantined => write!(f, "quarantined"),
            Recovery::Discarded => write!(f, "discarded"),
        }
    }
}

/// Migration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// Unknown destination name. Nothing was touched.
    #[error("world not found: {0}")]
    DestinationNotFound(String),

    /// Another migration of the same entity is in flight. Nothing was touched.
    #[error("entity is already being moved")]
    AlreadyInTransit,

    /// Only players may be moved through this entry point.
    #[error("entity is not a player")]
    NotAPlayer,

    /// The entity's current world could not run the detach (entity closed,
    /// despawned or its world stopped). The entity never left.
    #[error("failed to execute transaction on entity's world (entity closed?): {reason}")]
    SourceUnavailable { reason: String },

    /// The destination refused the entity after it had left its source.
    #[error("world {destination} refused the entity: {reason} ({recovery})")]
    AttachFailed {
        destination: String,
        reason: String,
        recovery: Recovery,
    },
}

impl MigrationError {
    /// Failures that left the entity outside its intended world.
    pub fn is_severe(&self) -> bool {
        matches!(self, MigrationError::AttachFailed { .. })
    }
}

/// Result of a successful migration.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub entity_id: EntityId,
    pub from: String,
    pub to: String,
    pub position: Position,
}

/// Migration coordinator.
pub struct TransferEntity {
    worlds: Arc<dyn WorldProvider>,
    quarantine: Arc<QuarantineStore>,
    config: MigrationConfig,
}

impl TransferEntity {
    pub fn new(
        worlds: Arc<dyn WorldProvider>,
        quarantine: Arc<QuarantineStore>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            worlds,
            quarantine,
            config,
        }
    }

    /// Move `handle` into the world named `world_name` at `position`.
    ///
    /// # Returns
    /// * `Ok(MigrationReport)` - Entity is resident in the destination
    /// * `Err(MigrationError)` - See the variants for what state each leaves
    pub async fn execute(
        &self,
        handle: &EntityHandle,
        world_name: &str,
        position: Position,
    ) -> Result<MigrationReport, MigrationError> {
        let timeout = self.config.phase_timeout;

        // 1. Resolve destination
        let destination = self
            .worlds
            .get_world(world_name)
            .ok_or_else(|| MigrationError::DestinationNotFound(world_name.to_string()))?;

        // 2. One migration per entity at a time
        let _guard = handle
            .begin_migration()
            .ok_or(MigrationError::AlreadyInTransit)?;

        // 3. Detach from the source world
        let detached = handle.detach(timeout).await.map_err(|e| {
            tracing::warn!(
                entity_id = %handle.id(),
                destination = %world_name,
                error = %e,
                "Detach failed, entity stays where it was"
            );
            MigrationError::SourceUnavailable {
                reason: e.to_string(),
            }
        })?;

        // 4. Attach to the destination and apply the target position
        let attach_handle = handle.clone();
        let attached = destination
            .exec_timeout(timeout, move |tx| {
                let entity = tx.add_entity(&attach_handle)?;
                entity.teleport(position);
                Some(entity.position())
            })
            .await;

        match attached {
            Ok(Some(position)) => {
                let report = MigrationReport {
                    entity_id: handle.id(),
                    from: detached.source.name().to_string(),
                    to: destination.name().to_string(),
                    position,
                };
                tracing::info!(
                    entity_id = %report.entity_id,
                    entity = %handle.name(),
                    from = %report.from,
                    to = %report.to,
                    position = %report.position,
                    "Entity transferred"
                );
                Ok(report)
            }
            Ok(None) => Err(self
                .recover(handle, &detached, world_name, "destination refused the entity")
                .await),
            Err(e) => Err(self.recover(handle, &detached, world_name, &e.to_string()).await),
        }
    }

    /// Same as [`execute`](Self::execute), restricted to player entities.
    pub async fn transfer_player(
        &self,
        handle: &EntityHandle,
        world_name: &str,
        position: Position,
    ) -> Result<MigrationReport, MigrationError> {
        if !handle.is_player() {
            return Err(MigrationError::NotAPlayer);
        }
        self.execute(handle, world_name, position).await
    }

    /// Attach failed after detach committed: the entity is in no world.
    async fn recover(
        &self,
        handle: &EntityHandle,
        detached: &Detached,
        destination: &str,
        reason: &str,
    ) -> MigrationError {
        let source = &detached.source;
        tracing::error!(
            entity_id = %handle.id(),
            entity = %handle.name(),
            source_world = %source.name(),
            destination = %destination,
            reason = %reason,
            "Attach failed after detach: entity is resident in no world"
        );

        let recovery = if handle.is_closed() {
            handle.take_in_transit();
            tracing::warn!(entity_id = %handle.id(), "Entity closed mid-migration, state dropped");
            Recovery::Discarded
        } else {
            let h = handle.clone();
            let returned = source
                .exec_timeout(self.config.phase_timeout, move |tx| {
                    tx.add_entity(&h).is_some()
                })
                .await;
            match returned {
                Ok(true) => {
                    tracing::warn!(
                        entity_id = %handle.id(),
                        world = %source.name(),
                        position = %detached.position,
                        "Entity returned to source world"
                    );
                    Recovery::ReturnedToSource
                }
                _ if handle.is_closed() => {
                    handle.take_in_transit();
                    tracing::warn!(entity_id = %handle.id(), "Entity closed during recovery, state dropped");
                    Recovery::Discarded
                }
                _ => {
                    self.quarantine.hold(
                        handle.clone(),
                        source.name().as_str(),
                        destination,
                        reason,
                    );
                    Recovery::Quarantined
                }
            }
        };

        MigrationError::AttachFailed {
            destination: destination.to_string(),
            reason: reason.to_string(),
            recovery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::ports::MockWorldProvider;
    use crate::infrastructure::registry::WorldRegistry;
    use crate::infrastructure::world_runtime::{WorldHandle, WorldSettings};
    use mockall::predicate::*;
    use multiworld_domain::{Entity, EntityName, WorldName};

    fn world(name: &str) -> WorldHandle {
        WorldHandle::spawn(WorldName::new(name).unwrap(), WorldSettings::default())
    }

    fn world_with_capacity(name: &str, max: usize) -> WorldHandle {
        WorldHandle::spawn(
            WorldName::new(name).unwrap(),
            WorldSettings {
                max_entities: Some(max),
                ..WorldSettings::default()
            },
        )
    }

    fn quarantine() -> Arc<QuarantineStore> {
        Arc::new(QuarantineStore::new(Arc::new(SystemClock::new())))
    }

    fn coordinator(registry: Arc<WorldRegistry>, timeout: Duration) -> TransferEntity {
        TransferEntity::new(
            registry,
            quarantine(),
            MigrationConfig {
                phase_timeout: timeout,
            },
        )
    }

    async fn spawn_player(world: &WorldHandle, name: &str, position: Position) -> EntityHandle {
        let h = EntityHandle::new(Entity::player(EntityName::new(name).unwrap(), position));
        h.spawn_into(world).await.unwrap();
        h
    }

    async fn position_in(world: &WorldHandle, id: EntityId) -> Option<Position> {
        world
            .exec(move |tx| tx.entity(id).map(|e| e.position()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_destination_touches_nothing() {
        let alpha = world("alpha");
        let h = spawn_player(&alpha, "Steve", Position::new(0.0, 64.0, 0.0)).await;

        let mut provider = MockWorldProvider::new();
        provider
            .expect_get_world()
            .with(eq("gamma"))
            .times(1)
            .returning(|_| None);
        let transfer = TransferEntity::new(
            Arc::new(provider),
            quarantine(),
            MigrationConfig::default(),
        );

        let err = transfer
            .execute(&h, "gamma", Position::new(1.0, 1.0, 1.0))
            .await
            .unwrap_err();
        assert_eq!(err, MigrationError::DestinationNotFound("gamma".into()));
        assert_eq!(
            position_in(&alpha, h.id()).await,
            Some(Position::new(0.0, 64.0, 0.0))
        );
        assert!(!h.is_migrating());
    }

    #[tokio::test]
    async fn closed_source_never_reaches_destination() {
        let alpha = world("alpha");
        let beta = world("beta");
        let h = spawn_player(&alpha, "Steve", Position::DEFAULT_SPAWN).await;
        h.close().await;

        let mut provider = MockWorldProvider::new();
        let dest = beta.clone();
        provider
            .expect_get_world()
            .with(eq("beta"))
            .returning(move |_| Some(dest.clone()));
        let transfer = TransferEntity::new(
            Arc::new(provider),
            quarantine(),
            MigrationConfig::default(),
        );

        let err = transfer
            .execute(&h, "beta", Position::DEFAULT_SPAWN)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::SourceUnavailable { .. }));
        // No unit of work was ever submitted to the destination.
        assert_eq!(beta.units_run(), 0);
    }

    #[tokio::test]
    async fn moves_entity_and_applies_position() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        let beta = world("beta");
        registry.register(alpha.clone()).unwrap();
        registry.register(beta.clone()).unwrap();
        let h = spawn_player(&alpha, "Steve", Position::new(0.0, 64.0, 0.0)).await;

        let report = coordinator(registry, Duration::from_secs(1))
            .execute(&h, "beta", Position::new(10.0, 70.0, 5.0))
            .await
            .unwrap();

        assert_eq!(report.from, "alpha");
        assert_eq!(report.to, "beta");
        assert_eq!(report.position, Position::new(10.0, 70.0, 5.0));
        assert_eq!(position_in(&alpha, h.id()).await, None);
        assert_eq!(
            position_in(&beta, h.id()).await,
            Some(Position::new(10.0, 70.0, 5.0))
        );
        assert!(h.current_world().unwrap().same_world(&beta));
        assert!(!h.is_in_transit());
        assert!(!h.is_migrating());
    }

    #[tokio::test]
    async fn self_migration_updates_position_in_place() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        registry.register(alpha.clone()).unwrap();
        let h = spawn_player(&alpha, "Steve", Position::DEFAULT_SPAWN).await;

        coordinator(registry, Duration::from_secs(1))
            .execute(&h, "alpha", Position::new(5.0, 65.0, 5.0))
            .await
            .unwrap();

        assert_eq!(
            position_in(&alpha, h.id()).await,
            Some(Position::new(5.0, 65.0, 5.0))
        );
        assert_eq!(alpha.exec(|tx| tx.len()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn refused_attach_returns_entity_to_source() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        let full = world_with_capacity("full", 0);
        registry.register(alpha.clone()).unwrap();
        registry.register(full.clone()).unwrap();
        let h = spawn_player(&alpha, "Steve", Position::new(1.0, 64.0, 1.0)).await;

        let err = coordinator(registry, Duration::from_secs(1))
            .execute(&h, "full", Position::new(9.0, 9.0, 9.0))
            .await
            .unwrap_err();

        assert!(err.is_severe());
        assert!(matches!(
            err,
            MigrationError::AttachFailed {
                recovery: Recovery::ReturnedToSource,
                ..
            }
        ));
        // Back home, at the old position.
        assert_eq!(
            position_in(&alpha, h.id()).await,
            Some(Position::new(1.0, 64.0, 1.0))
        );
        assert_eq!(full.exec(|tx| tx.len()).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unrecoverable_attach_failure_quarantines_entity() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        let slow = world("slow");
        registry.register(alpha.clone()).unwrap();
        registry.register(slow.clone()).unwrap();
        let h = spawn_player(&alpha, "Steve", Position::DEFAULT_SPAWN).await;

        // Keep the destination busy past the phase timeout.
        let _busy = slow
            .submit(|_| std::thread::sleep(Duration::from_millis(300)))
            .unwrap();

        // Stop the source as soon as the entity has left it.
        let watcher = {
            let h = h.clone();
            let alpha = alpha.clone();
            tokio::spawn(async move {
                while !h.is_in_transit() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                alpha.close();
            })
        };

        let quarantine = quarantine();
        let transfer = TransferEntity::new(
            registry,
            Arc::clone(&quarantine),
            MigrationConfig {
                phase_timeout: Duration::from_millis(100),
            },
        );
        let err = transfer
            .execute(&h, "slow", Position::DEFAULT_SPAWN)
            .await
            .unwrap_err();
        watcher.await.unwrap();

        assert!(matches!(
            err,
            MigrationError::AttachFailed {
                recovery: Recovery::Quarantined,
                ..
            }
        ));
        let record = quarantine.get(h.id()).expect("entity is quarantined");
        assert_eq!(record.source_world, "alpha");
        assert_eq!(record.failed_destination, "slow");
        assert!(h.is_in_transit());
        assert!(h.current_world().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn detach_timeout_leaves_entity_in_source() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        let beta = world("beta");
        registry.register(alpha.clone()).unwrap();
        registry.register(beta.clone()).unwrap();
        let start = Position::new(2.0, 64.0, 2.0);
        let h = spawn_player(&alpha, "Steve", start).await;

        // Keep the source busy past the phase timeout.
        let _busy = alpha
            .submit(|_| std::thread::sleep(Duration::from_millis(300)))
            .unwrap();

        let err = coordinator(registry, Duration::from_millis(50))
            .execute(&h, "beta", Position::new(9.0, 9.0, 9.0))
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::SourceUnavailable { .. }));
        assert_eq!(position_in(&alpha, h.id()).await, Some(start));
        assert!(h.current_world().unwrap().same_world(&alpha));
        assert_eq!(beta.units_run(), 0);
        assert!(!h.is_migrating());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn entity_closed_mid_migration_is_discarded() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        let slow = world("slow");
        registry.register(alpha.clone()).unwrap();
        registry.register(slow.clone()).unwrap();
        let h = spawn_player(&alpha, "Steve", Position::DEFAULT_SPAWN).await;

        let _busy = slow
            .submit(|_| std::thread::sleep(Duration::from_millis(300)))
            .unwrap();

        // Disconnect as soon as the entity has left its source.
        let disconnect = {
            let h = h.clone();
            tokio::spawn(async move {
                while !h.is_in_transit() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                h.close().await;
            })
        };

        let quarantine = quarantine();
        let transfer = TransferEntity::new(
            registry,
            Arc::clone(&quarantine),
            MigrationConfig {
                phase_timeout: Duration::from_millis(100),
            },
        );
        let err = transfer
            .execute(&h, "slow", Position::DEFAULT_SPAWN)
            .await
            .unwrap_err();
        disconnect.await.unwrap();

        assert!(matches!(
            err,
            MigrationError::AttachFailed {
                recovery: Recovery::Discarded,
                ..
            }
        ));
        assert!(quarantine.is_empty());
        assert!(!h.is_in_transit());
        assert_eq!(alpha.exec(|tx| tx.len()).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn disconnect_racing_migration_leaves_no_ghost() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        let beta = world("beta");
        registry.register(alpha.clone()).unwrap();
        registry.register(beta.clone()).unwrap();
        let transfer = coordinator(registry, Duration::from_secs(1));

        for i in 0..200 {
            let h = spawn_player(&alpha, &format!("Player{i}"), Position::DEFAULT_SPAWN).await;
            let disconnect = {
                let h = h.clone();
                tokio::spawn(async move {
                    for _ in 0..(i % 4) {
                        tokio::task::yield_now().await;
                    }
                    h.close().await;
                })
            };
            // Any outcome is acceptable; a closed entity must just end up nowhere.
            let _ = transfer.execute(&h, "beta", Position::DEFAULT_SPAWN).await;
            disconnect.await.unwrap();

            let id = h.id();
            assert!(!alpha.exec(move |tx| tx.contains(id)).await.unwrap(), "iteration {i}");
            assert!(!beta.exec(move |tx| tx.contains(id)).await.unwrap(), "iteration {i}");
            assert!(!h.is_in_transit(), "iteration {i}");
            assert!(h.current_world().is_none(), "iteration {i}");
        }
    }

    #[tokio::test]
    async fn concurrent_migration_of_same_entity_is_rejected() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        let beta = world("beta");
        let gamma = world("gamma");
        registry.register(alpha.clone()).unwrap();
        registry.register(beta.clone()).unwrap();
        registry.register(gamma.clone()).unwrap();
        let h = spawn_player(&alpha, "Steve", Position::DEFAULT_SPAWN).await;
        let transfer = coordinator(registry, Duration::from_secs(1));

        let (first, second) = tokio::join!(
            transfer.execute(&h, "beta", Position::DEFAULT_SPAWN),
            transfer.execute(&h, "gamma", Position::DEFAULT_SPAWN),
        );

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), MigrationError::AlreadyInTransit);
        assert!(position_in(&beta, h.id()).await.is_some());
        assert!(position_in(&gamma, h.id()).await.is_none());
        assert!(position_in(&alpha, h.id()).await.is_none());
    }

    #[tokio::test]
    async fn held_migration_token_blocks_new_migration() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        registry.register(alpha.clone()).unwrap();
        let h = spawn_player(&alpha, "Steve", Position::DEFAULT_SPAWN).await;

        let _guard = h.begin_migration().unwrap();
        let err = coordinator(registry, Duration::from_secs(1))
            .execute(&h, "alpha", Position::DEFAULT_SPAWN)
            .await
            .unwrap_err();
        assert_eq!(err, MigrationError::AlreadyInTransit);
        assert!(position_in(&alpha, h.id()).await.is_some());
    }

    #[tokio::test]
    async fn transfer_player_rejects_npcs() {
        let registry = Arc::new(WorldRegistry::new());
        let alpha = world("alpha");
        let beta = world("beta");
        registry.register(alpha.clone()).unwrap();
        registry.register(beta.clone()).unwrap();
        let npc = EntityHandle::new(Entity::npc(
            EntityName::new("Zombie").unwrap(),
            Position::DEFAULT_SPAWN,
        ));
        npc.spawn_into(&alpha).await.unwrap();

        let transfer = coordinator(registry, Duration::from_secs(1));
        assert_eq!(
            transfer
                .transfer_player(&npc, "beta", Position::DEFAULT_SPAWN)
                .await
                .unwrap_err(),
            MigrationError::NotAPlayer
        );
        // The general entry point still moves NPCs.
        transfer
            .execute(&npc, "beta", Position::DEFAULT_SPAWN)
            .await
            .unwrap();
        assert!(position_in(&beta, npc.id()).await.is_some());
    }
}
