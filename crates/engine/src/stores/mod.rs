//! In-memory state storage modules.
//!
//! Stores manage runtime state that has no home in any world:
//! - `QuarantineStore` - entities orphaned by a failed migration

pub mod quarantine;

pub use quarantine::{QuarantineStore, QuarantinedEntity, RestoreError};
