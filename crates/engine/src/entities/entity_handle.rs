//! Entity handle - a world-independent reference to one entity.
//!
//! The handle outlives any particular residency. While the entity lives in a
//! world, the handle points at that world and the state sits in the world's
//! live set. While it is between worlds (or not yet placed), the handle holds
//! the state itself in its in-transit slot. Exactly one of the two holds it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use multiworld_domain::{Entity, EntityId, EntityKind, EntityName, Position};

use crate::infrastructure::world_runtime::{WorldError, WorldHandle, WorldTx};

/// How many times `exec_world` follows an entity that moved while the unit
/// of work was queued.
const MAX_EXEC_ATTEMPTS: usize = 3;

struct HandleInner {
    id: EntityId,
    name: EntityName,
    kind: EntityKind,
    world: RwLock<Option<WorldHandle>>,
    in_transit: Mutex<Option<Entity>>,
    closed: AtomicBool,
    migrating: AtomicBool,
}

/// Stable, clonable reference to an entity regardless of where it lives.
#[derive(Clone)]
pub struct EntityHandle {
    inner: Arc<HandleInner>,
}

/// Errors from placing an entity into a world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("World {0} refused the entity")]
    Refused(String),
}

/// Errors from removing an entity from its current world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetachError {
    #[error("Entity handle is closed")]
    Closed,
    #[error("Entity is not resident in any world")]
    NotResident,
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Outcome of a committed detach.
#[derive(Debug, Clone)]
pub struct Detached {
    /// The world the entity was removed from
    pub source: WorldHandle,
    /// Where the entity stood when it left
    pub position: Position,
}

impl EntityHandle {
    /// Create a handle for an entity that is not yet in any world.
    pub fn new(entity: Entity) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: entity.id(),
                name: entity.name().clone(),
                kind: entity.kind(),
                world: RwLock::new(None),
                in_transit: Mutex::new(Some(entity)),
                closed: AtomicBool::new(false),
                migrating: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    pub fn name(&self) -> &EntityName {
        &self.inner.name
    }

    pub fn kind(&self) -> EntityKind {
        self.inner.kind
    }

    pub fn is_player(&self) -> bool {
        self.inner.kind == EntityKind::Player
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// The world the entity is resident in right now, if any.
    pub fn current_world(&self) -> Option<WorldHandle> {
        self.inner
            .world
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the handle is holding the entity's state outside any world.
    pub fn is_in_transit(&self) -> bool {
        self.inner
            .in_transit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn is_migrating(&self) -> bool {
        self.inner.migrating.load(Ordering::Acquire)
    }

    // =========================================================================
    // Residency bookkeeping (driven by world units of work)
    // =========================================================================

    pub(crate) fn set_world(&self, world: Option<WorldHandle>) {
        *self
            .inner
            .world
            .write()
            .unwrap_or_else(PoisonError::into_inner) = world;
    }

    pub(crate) fn take_in_transit(&self) -> Option<Entity> {
        self.inner
            .in_transit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Take the in-transit state and point the handle at `world`, unless the
    /// handle is closed. Holds the in-transit lock throughout so `close`
    /// either sees the new world or stops the claim.
    pub(crate) fn claim_for(&self, world: &WorldHandle) -> Option<Entity> {
        let mut slot = self
            .inner
            .in_transit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return None;
        }
        let entity = slot.take()?;
        self.set_world(Some(world.clone()));
        Some(entity)
    }

    pub(crate) fn put_in_transit(&self, entity: Entity) {
        *self
            .inner
            .in_transit
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(entity);
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Place an unplaced (or in-transit) entity into `world`.
    pub async fn spawn_into(&self, world: &WorldHandle) -> Result<(), SpawnError> {
        let handle = self.clone();
        let added = world
            .exec(move |tx| tx.add_entity(&handle).is_some())
            .await?;
        if added {
            tracing::info!(
                entity_id = %self.id(),
                entity = %self.name(),
                world = %world.name(),
                "Entity spawned"
            );
            Ok(())
        } else {
            Err(SpawnError::Refused(world.name().to_string()))
        }
    }

    /// Run `f` with exclusive access to the entity inside its owning world.
    ///
    /// Returns `false` without running `f` when the handle is closed, the
    /// entity is in transit, or its world stopped. If the entity moved to
    /// another world while the work was queued, the work follows it.
    pub async fn exec_world<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut WorldTx, &mut Entity) + Send + 'static,
    {
        let id = self.id();
        let mut f = f;
        for _ in 0..MAX_EXEC_ATTEMPTS {
            if self.is_closed() {
                return false;
            }
            let Some(world) = self.current_world() else {
                return false;
            };

            let outcome = world
                .exec(move |tx| {
                    if tx.contains(id) {
                        tx.with_entity(id, f);
                        Ok(())
                    } else {
                        Err(f)
                    }
                })
                .await;

            match outcome {
                Ok(Ok(())) => return true,
                Ok(Err(returned)) => f = returned,
                Err(_) => return false,
            }

            let moved = self
                .current_world()
                .is_some_and(|now| !now.same_world(&world));
            if !moved {
                return false;
            }
            tracing::debug!(entity_id = %id, "Entity changed worlds, following it");
        }
        false
    }

    /// Remove the entity from its current world and hold its state in the
    /// handle. Runs as one unit of work on the source world.
    pub async fn detach(&self, timeout: Duration) -> Result<Detached, DetachError> {
        if self.is_closed() {
            return Err(DetachError::Closed);
        }
        let source = self.current_world().ok_or(DetachError::NotResident)?;

        let handle = self.clone();
        let id = self.id();
        let position = source
            .exec_timeout(timeout, move |tx| {
                let entity = tx.remove_entity(id)?;
                let position = entity.position();
                handle.put_in_transit(entity);
                Some(position)
            })
            .await?
            .ok_or(DetachError::NotResident)?;

        Ok(Detached { source, position })
    }

    /// Disconnect: close the handle and drop the entity from its world.
    pub async fn close(&self) {
        let world = {
            let mut slot = self
                .inner
                .in_transit
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            slot.take();
            self.current_world()
        };
        if let Some(world) = world {
            let id = self.id();
            if let Err(e) = world.exec(move |tx| tx.remove_entity(id)).await {
                tracing::debug!(entity_id = %id, error = %e, "World already gone on close");
            }
        }
        tracing::info!(entity_id = %self.id(), entity = %self.name(), "Entity handle closed");
    }

    /// Claim the right to migrate this entity.
    ///
    /// Returns `None` if another migration already holds it. The claim is
    /// released when the guard is dropped.
    pub fn begin_migration(&self) -> Option<MigrationGuard> {
        self.inner
            .migrating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| MigrationGuard {
                handle: self.clone(),
            })
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("world", &self.current_world().map(|w| w.name().to_string()))
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Exclusive migration claim on one entity handle.
pub struct MigrationGuard {
    handle: EntityHandle,
}

impl Drop for MigrationGuard {
    fn drop(&mut self) {
        self.handle.inner.migrating.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::world_runtime::WorldSettings;
    use multiworld_domain::WorldName;

    fn world(name: &str) -> WorldHandle {
        WorldHandle::spawn(WorldName::new(name).unwrap(), WorldSettings::default())
    }

    fn steve() -> EntityHandle {
        EntityHandle::new(Entity::player(
            EntityName::new("Steve").unwrap(),
            Position::new(0.0, 64.0, 0.0),
        ))
    }

    #[tokio::test]
    async fn new_handle_is_unplaced() {
        let h = steve();
        assert!(h.is_in_transit());
        assert!(h.current_world().is_none());
        assert!(!h.exec_world(|_, _| {}).await);
    }

    #[tokio::test]
    async fn exec_world_runs_against_resident_entity() {
        let w = world("alpha");
        let h = steve();
        h.spawn_into(&w).await.unwrap();
        assert!(!h.is_in_transit());

        let ran = h
            .exec_world(|tx, e| {
                assert_eq!(tx.world_name().as_str(), "alpha");
                e.teleport(Position::new(1.0, 2.0, 3.0));
            })
            .await;
        assert!(ran);

        let id = h.id();
        let pos = w
            .exec(move |tx| tx.entity(id).map(|e| e.position()))
            .await
            .unwrap();
        assert_eq!(pos, Some(Position::new(1.0, 2.0, 3.0)));
    }

    #[tokio::test]
    async fn exec_world_after_close_does_not_run() {
        let w = world("alpha");
        let h = steve();
        h.spawn_into(&w).await.unwrap();
        h.close().await;

        assert!(!h.exec_world(|_, _| panic!("must not run")).await);
        let id = h.id();
        assert!(!w.exec(move |tx| tx.contains(id)).await.unwrap());
    }

    #[tokio::test]
    async fn detach_moves_state_into_handle() {
        let w = world("alpha");
        let h = steve();
        h.spawn_into(&w).await.unwrap();

        let detached = h.detach(Duration::from_secs(1)).await.unwrap();
        assert!(detached.source.same_world(&w));
        assert_eq!(detached.position, Position::new(0.0, 64.0, 0.0));
        assert!(h.is_in_transit());
        assert!(h.current_world().is_none());
    }

    #[tokio::test]
    async fn detach_of_closed_handle_fails() {
        let w = world("alpha");
        let h = steve();
        h.spawn_into(&w).await.unwrap();
        h.close().await;
        assert_eq!(
            h.detach(Duration::from_secs(1)).await.unwrap_err(),
            DetachError::Closed
        );
    }

    #[tokio::test]
    async fn close_while_in_transit_blocks_later_claim() {
        let w = world("alpha");
        let h = steve();
        h.spawn_into(&w).await.unwrap();
        h.detach(Duration::from_secs(1)).await.unwrap();

        h.close().await;
        assert!(!h.is_in_transit());
        assert!(h.claim_for(&w).is_none());
        assert!(h.current_world().is_none());
        let added = w
            .exec({
                let h = h.clone();
                move |tx| tx.add_entity(&h).is_some()
            })
            .await
            .unwrap();
        assert!(!added);
    }

    #[tokio::test]
    async fn migration_guard_is_exclusive_and_released_on_drop() {
        let h = steve();
        let guard = h.begin_migration().expect("first claim succeeds");
        assert!(h.is_migrating());
        assert!(h.begin_migration().is_none());
        drop(guard);
        assert!(!h.is_migrating());
        assert!(h.begin_migration().is_some());
    }
}
