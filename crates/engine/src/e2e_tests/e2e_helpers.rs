//! Shared setup for end-to-end tests.

use std::time::Duration;

use multiworld_domain::{Entity, EntityId, EntityName, Position};
use tempfile::TempDir;

use crate::entities::EntityHandle;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::world_runtime::WorldHandle;
use crate::use_cases::world::LoadSummary;
use crate::App;

/// A loaded `App` over its own temporary worlds folder.
pub struct E2ETestContext {
    pub app: App,
    pub summary: LoadSummary,
    _dir: TempDir,
}

impl E2ETestContext {
    /// Create one directory per world (with optional `world.json` contents)
    /// and load them.
    pub async fn setup(worlds: &[(&str, Option<&str>)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("worlds");
        for (name, settings) in worlds {
            let world_dir = root.join(name);
            std::fs::create_dir_all(&world_dir).expect("create world dir");
            if let Some(json) = settings {
                std::fs::write(world_dir.join("world.json"), json).expect("write settings");
            }
        }

        let config = AppConfig {
            worlds_dir: root,
            migration_timeout: Duration::from_secs(2),
            ..AppConfig::default()
        };
        let app = App::new(config);
        let summary = app
            .use_cases
            .load_worlds
            .execute(&app.registry)
            .await
            .expect("worlds load");

        Self {
            app,
            summary,
            _dir: dir,
        }
    }

    pub fn world(&self, name: &str) -> WorldHandle {
        self.app
            .registry
            .resolve(name)
            .unwrap_or_else(|| panic!("world {name} should be loaded"))
    }

    /// Spawn a player into `world` at `position`.
    pub async fn spawn_player(&self, world: &str, name: &str, position: Position) -> EntityHandle {
        let handle = EntityHandle::new(Entity::player(
            EntityName::new(name).expect("valid name"),
            position,
        ));
        handle
            .spawn_into(&self.world(world))
            .await
            .expect("spawn succeeds");
        handle
    }

    /// Total residents across all loaded worlds.
    pub async fn population(&self) -> usize {
        let mut total = 0;
        for world in self.app.registry.worlds() {
            total += world.exec(|tx| tx.len()).await.expect("world running");
        }
        total
    }
}

/// Position of `id` in `world`, if resident there.
pub async fn position_in(world: &WorldHandle, id: EntityId) -> Option<Position> {
    world
        .exec(move |tx| tx.entity(id).map(|e| e.position()))
        .await
        .expect("world running")
}

/// Inbox of `id` in `world`.
pub async fn inbox_in(world: &WorldHandle, id: EntityId) -> Vec<String> {
    world
        .exec(move |tx| tx.entity(id).map(|e| e.inbox().to_vec()).unwrap_or_default())
        .await
        .expect("world running")
}
