//! API layer - command entry points.

pub mod commands;

pub use commands::{CommandError, CommandHandler, CommandOutcome, WorldCommand};
