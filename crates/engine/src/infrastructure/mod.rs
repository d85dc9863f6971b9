//! Infrastructure: world runtimes and everything they are built from.

pub mod clock;
pub mod config;
pub mod ports;
pub mod registry;
pub mod storage;
pub mod world_runtime;
