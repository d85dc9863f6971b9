//! Value objects - Immutable objects defined by their attributes

mod names;
mod position;

pub use names::{EntityName, WorldName};
pub use position::Position;
