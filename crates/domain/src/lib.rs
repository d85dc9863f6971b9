//! Multiworld domain types.
//!
//! Identifiers, validated names, positions and the transferable [`Entity`]
//! state. Nothing in here knows about worlds running as tasks; that lives in
//! `multiworld-engine`.

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use entities::{Entity, EntityKind};
pub use error::DomainError;
pub use ids::{EntityId, WorldId};
pub use value_objects::{EntityName, Position, WorldName};
