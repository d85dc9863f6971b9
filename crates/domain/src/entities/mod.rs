//! Domain entities

mod entity;

pub use entity::{Entity, EntityKind};
