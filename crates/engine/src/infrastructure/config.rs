//! Engine configuration from environment variables.
//!
//! `main` loads a `.env` file first (via dotenvy), so every key can also be
//! set there.

use std::path::PathBuf;
use std::time::Duration;

use multiworld_domain::Position;

const DEFAULT_WORLDS_DIR: &str = "worlds";
const DEFAULT_MIGRATION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CONSOLE_PLAYER: &str = "Console";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Directory scanned for worlds at startup (`WORLDS_DIR`)
    pub worlds_dir: PathBuf,
    /// Bound on each migration phase (`MIGRATION_TIMEOUT_MS`)
    pub migration_timeout: Duration,
    /// Where teleports land when no coordinates are given (`SPAWN_X/Y/Z`)
    pub default_spawn: Position,
    /// Name of the player driven from stdin (`CONSOLE_PLAYER`)
    pub console_player: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worlds_dir: PathBuf::from(DEFAULT_WORLDS_DIR),
            migration_timeout: Duration::from_millis(DEFAULT_MIGRATION_TIMEOUT_MS),
            default_spawn: Position::DEFAULT_SPAWN,
            console_player: DEFAULT_CONSOLE_PLAYER.to_string(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup. Invalid values
    /// fall back to defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let worlds_dir = lookup("WORLDS_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.worlds_dir);

        let migration_timeout = lookup("MIGRATION_TIMEOUT_MS")
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => {
                    tracing::warn!(value = %raw, "Invalid MIGRATION_TIMEOUT_MS, using default");
                    None
                }
            })
            .unwrap_or(defaults.migration_timeout);

        let spawn_parts = (lookup("SPAWN_X"), lookup("SPAWN_Y"), lookup("SPAWN_Z"));
        let default_spawn = match spawn_parts {
            (Some(x), Some(y), Some(z)) => Position::from_components(&x, &y, &z)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Invalid SPAWN_X/Y/Z, using default");
                    defaults.default_spawn
                }),
            _ => defaults.default_spawn,
        };

        let console_player = lookup("CONSOLE_PLAYER")
            .map(|raw| raw.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or(defaults.console_player);

        Self {
            worlds_dir,
            migration_timeout,
            default_spawn,
            console_player,
        }
    }
}
