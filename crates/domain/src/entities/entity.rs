//! Entity - the live, transferable representation of something in a world.
//!
//! An `Entity` value is owned by exactly one place at a time: either a
//! world's live set, or the in-transit slot of its handle while it is being
//! migrated. The whole value moves, so the state it carries (position,
//! pending messages) moves with it.

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;
use crate::value_objects::{EntityName, Position};

/// What kind of entity this is. Only players can issue commands and
/// receive chat feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Npc,
}

/// Live entity state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    name: EntityName,
    kind: EntityKind,
    position: Position,
    /// Chat lines delivered to this entity, oldest first
    #[serde(default)]
    inbox: Vec<String>,
}

impl Entity {
    pub fn new(name: EntityName, kind: EntityKind, position: Position) -> Self {
        Self {
            id: EntityId::new(),
            name,
            kind,
            position,
            inbox: Vec::new(),
        }
    }

    pub fn player(name: EntityName, position: Position) -> Self {
        Self::new(name, EntityKind::Player, position)
    }

    pub fn npc(name: EntityName, position: Position) -> Self {
        Self::new(name, EntityKind::Npc, position)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &EntityName {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_player(&self) -> bool {
        self.kind == EntityKind::Player
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn inbox(&self) -> &[String] {
        &self.inbox
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Move the entity within its current world.
    pub fn teleport(&mut self, position: Position) {
        self.position = position;
    }

    /// Deliver a chat line to the entity.
    pub fn message(&mut self, text: impl Into<String>) {
        self.inbox.push(text.into());
    }

    /// Take all pending chat lines, leaving the inbox empty.
    pub fn drain_inbox(&mut self) -> Vec<String> {
        std::mem::take(&mut self.inbox)
    }
}
