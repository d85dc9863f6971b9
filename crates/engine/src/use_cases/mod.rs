//! Use cases - User story orchestration.
//!
//! Use cases orchestrate across the world runtime, entity handles and
//! stores to fulfill a single user story.

pub mod migration;
pub mod world;

pub use migration::TransferEntity;
pub use world::LoadWorlds;
