//! Multiworld Engine library.
//!
//! Runs independent worlds side by side and moves live entities between
//! them.
//!
//! ## Structure
//!
//! - `entities/` - Entity handles (identity plus in-transit state)
//! - `use_cases/` - Migration and world loading
//! - `infrastructure/` - World runtime, registry, storage, config (ports + adapters)
//! - `stores/` - Quarantine for entities orphaned by a failed migration
//! - `api/` - World commands
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod entities;
pub mod infrastructure;
pub mod stores;
pub mod use_cases;

/// End-to-end scenarios through the composed `App`.
#[cfg(test)]
mod e2e_tests;

pub use app::App;
