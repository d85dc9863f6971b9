//! World management use cases.

mod load_worlds;

pub use load_worlds::{LoadSummary, LoadWorlds, LoadWorldsError, SkipReason, SkippedWorld};
