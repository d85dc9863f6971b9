//! World runtime - the per-world serialized execution primitive.
//!
//! Every world is a tokio task that owns its live entity set. All reads and
//! writes of that set happen inside units of work submitted through a
//! [`WorldHandle`]; the task runs them strictly one at a time, so a unit of
//! work has exclusive access to the world for its whole duration. Different
//! worlds run concurrently with each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use multiworld_domain::{Entity, EntityId, Position, WorldId, WorldName};

use crate::entities::EntityHandle;

/// A unit of work, run with exclusive access to one world.
type Job = Box<dyn FnOnce(&mut WorldTx) + Send + 'static>;

// Ticket states for `exec_timeout`
const TICKET_PENDING: u8 = 0;
const TICKET_STARTED: u8 = 1;
const TICKET_ABANDONED: u8 = 2;

/// Per-world settings, read from storage when the world is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Maximum number of resident entities; `None` means unbounded
    pub max_entities: Option<usize>,
    /// Landing point for first placement into this world (`spawn_into`
    /// callers read it). Teleports without coordinates use the configured
    /// default spawn instead.
    pub spawn: Position,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            max_entities: None,
            spawn: Position::DEFAULT_SPAWN,
        }
    }
}

/// Errors from submitting work to a world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("World {0} is closed")]
    Closed(String),
    #[error("World {world} did not run the unit of work within {timeout:?}")]
    TimedOut { world: String, timeout: Duration },
}

impl WorldError {
    fn closed(name: &WorldName) -> Self {
        Self::Closed(name.to_string())
    }
}

struct WorldInner {
    id: WorldId,
    name: WorldName,
    settings: WorldSettings,
    sender: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
    units_run: AtomicU64,
}

/// Cheaply clonable reference to a running world.
#[derive(Clone)]
pub struct WorldHandle {
    inner: Arc<WorldInner>,
}

impl WorldHandle {
    /// Start a world runtime on the current tokio runtime.
    pub fn spawn(name: WorldName, settings: WorldSettings) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let shutdown = CancellationToken::new();
        let handle = Self {
            inner: Arc::new(WorldInner {
                id: WorldId::new(),
                name,
                settings,
                sender,
                shutdown: shutdown.clone(),
                units_run: AtomicU64::new(0),
            }),
        };

        let mut tx = WorldTx::new(handle.clone());
        tokio::spawn(async move {
            tracing::debug!(world = %tx.world_name(), "World runtime started");
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    job = receiver.recv() => match job {
                        Some(job) => {
                            job(&mut tx);
                            tx.world.inner.units_run.fetch_add(1, Ordering::Relaxed);
                        }
                        None => break,
                    },
                }
            }
            // Queued work is dropped here; its callers observe `Closed`.
            receiver.close();
            tx.shutdown();
        });

        handle
    }

    pub fn id(&self) -> WorldId {
        self.inner.id
    }

    pub fn name(&self) -> &WorldName {
        &self.inner.name
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.inner.settings
    }

    /// Number of units of work this world has run so far.
    pub fn units_run(&self) -> u64 {
        self.inner.units_run.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled() || self.inner.sender.is_closed()
    }

    /// Stop the world. Resident entities' handles are closed once the
    /// runtime winds down.
    pub fn close(&self) {
        tracing::info!(world = %self.name(), "Closing world");
        self.inner.shutdown.cancel();
    }

    /// Queue a unit of work and return its completion channel.
    ///
    /// # Errors
    ///
    /// `WorldError::Closed` if the world no longer accepts work.
    pub fn submit<R, F>(&self, f: F) -> Result<oneshot::Receiver<R>, WorldError>
    where
        R: Send + 'static,
        F: FnOnce(&mut WorldTx) -> R + Send + 'static,
    {
        if self.inner.shutdown.is_cancelled() {
            return Err(WorldError::closed(self.name()));
        }
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move |tx| {
            // The caller may have stopped listening; the work still counts.
            let _ = done_tx.send(f(tx));
        });
        self.inner
            .sender
            .send(job)
            .map_err(|_| WorldError::closed(self.name()))?;
        Ok(done_rx)
    }

    /// Run a unit of work and wait for its result.
    pub async fn exec<R, F>(&self, f: F) -> Result<R, WorldError>
    where
        R: Send + 'static,
        F: FnOnce(&mut WorldTx) -> R + Send + 'static,
    {
        self.submit(f)?
            .await
            .map_err(|_| WorldError::closed(self.name()))
    }

    /// Run a unit of work, waiting at most `timeout` for it to start.
    ///
    /// If the deadline passes while the work is still queued, the work is
    /// abandoned and will never run. If it had already started, this waits
    /// for it to finish and returns its result: a timeout is only reported
    /// for work that did not happen.
    pub async fn exec_timeout<R, F>(&self, timeout: Duration, f: F) -> Result<R, WorldError>
    where
        R: Send + 'static,
        F: FnOnce(&mut WorldTx) -> R + Send + 'static,
    {
        let ticket = Arc::new(AtomicU8::new(TICKET_PENDING));
        let job_ticket = Arc::clone(&ticket);
        let mut done = self.submit(move |tx| {
            job_ticket
                .compare_exchange(
                    TICKET_PENDING,
                    TICKET_STARTED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .ok()
                .map(|_| f(tx))
        })?;

        match tokio::time::timeout(timeout, &mut done).await {
            Ok(Ok(Some(result))) => Ok(result),
            Ok(Ok(None)) | Ok(Err(_)) => Err(WorldError::closed(self.name())),
            Err(_) => {
                let abandoned = ticket
                    .compare_exchange(
                        TICKET_PENDING,
                        TICKET_ABANDONED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if abandoned {
                    tracing::warn!(
                        world = %self.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Abandoned queued unit of work after timeout"
                    );
                    return Err(WorldError::TimedOut {
                        world: self.name().to_string(),
                        timeout,
                    });
                }
                // Already running: it will finish, so use its outcome.
                match done.await {
                    Ok(Some(result)) => Ok(result),
                    _ => Err(WorldError::closed(self.name())),
                }
            }
        }
    }

    /// Whether two handles point at the same running world.
    pub fn same_world(&self, other: &WorldHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for WorldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct Resident {
    entity: Entity,
    handle: EntityHandle,
}

/// Exclusive-access context for one world, handed to each unit of work.
pub struct WorldTx {
    world: WorldHandle,
    residents: HashMap<EntityId, Resident>,
}

impl WorldTx {
    fn new(world: WorldHandle) -> Self {
        Self {
            world,
            residents: HashMap::new(),
        }
    }

    pub fn world_name(&self) -> &WorldName {
        self.world.name()
    }

    pub fn settings(&self) -> &WorldSettings {
        self.world.settings()
    }

    pub fn len(&self) -> usize {
        self.residents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residents.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.residents.contains_key(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.residents.get(&id).map(|r| &r.entity)
    }

    /// Run `f` against a resident entity while keeping access to the world.
    ///
    /// The entity is lifted out of the live set for the duration of `f`, so
    /// lookups through `tx` inside `f` will not see it.
    pub fn with_entity<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut WorldTx, &mut Entity) -> R,
    ) -> Option<R> {
        let mut resident = self.residents.remove(&id)?;
        let out = f(self, &mut resident.entity);
        self.residents.insert(id, resident);
        Some(out)
    }

    /// Make the in-transit entity carried by `handle` resident here.
    ///
    /// Returns `None`, leaving the handle untouched, when the handle is
    /// closed, carries no in-transit entity, is already resident, or the
    /// world is full.
    pub fn add_entity(&mut self, handle: &EntityHandle) -> Option<&mut Entity> {
        if handle.is_closed() || self.residents.contains_key(&handle.id()) {
            return None;
        }
        if let Some(max) = self.settings().max_entities {
            if self.residents.len() >= max {
                tracing::warn!(
                    world = %self.world_name(),
                    entity_id = %handle.id(),
                    max_entities = max,
                    "World is full, refusing entity"
                );
                return None;
            }
        }

        let entity = handle.claim_for(&self.world)?;
        let id = entity.id();
        self.residents.insert(
            id,
            Resident {
                entity,
                handle: handle.clone(),
            },
        );
        tracing::debug!(world = %self.world_name(), entity_id = %id, "Entity added");
        self.residents.get_mut(&id).map(|r| &mut r.entity)
    }

    /// Remove an entity from the live set and return its state.
    ///
    /// The entity's handle stops pointing at this world; what happens to the
    /// returned state is up to the caller.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let resident = self.residents.remove(&id)?;
        resident.handle.set_world(None);
        tracing::debug!(world = %self.world_name(), entity_id = %id, "Entity removed");
        Some(resident.entity)
    }

    fn shutdown(&mut self) {
        let count = self.residents.len();
        for (_, resident) in self.residents.drain() {
            resident.handle.set_world(None);
            resident.handle.mark_closed();
        }
        tracing::info!(
            world = %self.world.name(),
            closed_entities = count,
            "World runtime stopped"
        );
    }
}
