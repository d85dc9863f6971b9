//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - World lookup (registry, or an in-memory double in tests)
//! - World storage (filesystem today)
//! - Clock (for testing)

mod error;
mod testing;
mod world;

pub use error::StorageError;
pub use testing::ClockPort;
pub use world::{WorldProvider, WorldStorage};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use testing::MockClockPort;

#[cfg(test)]
pub use world::{MockWorldProvider, MockWorldStorage};
