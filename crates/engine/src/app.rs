//! Application state and composition.

use std::sync::Arc;

use crate::api::CommandHandler;
use crate::infrastructure::{
    clock::SystemClock,
    config::AppConfig,
    ports::{ClockPort, WorldProvider, WorldStorage},
    registry::WorldRegistry,
    storage::FsWorldStorage,
};
use crate::stores::QuarantineStore;
use crate::use_cases::{
    migration::{MigrationConfig, TransferEntity},
    world::LoadWorlds,
};

/// Main application state.
///
/// Built once at startup; the registry and quarantine are shared by
/// reference with every component that needs them.
pub struct App {
    pub config: AppConfig,
    pub registry: Arc<WorldRegistry>,
    pub quarantine: Arc<QuarantineStore>,
    pub use_cases: UseCases,
    pub commands: CommandHandler,
}

/// Container for all use cases.
pub struct UseCases {
    pub transfer: Arc<TransferEntity>,
    pub load_worlds: LoadWorlds,
}

impl App {
    /// Wire the application against the filesystem world storage.
    pub fn new(config: AppConfig) -> Self {
        let storage: Arc<dyn WorldStorage> = Arc::new(FsWorldStorage::new(&config.worlds_dir));
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
        Self::with_ports(config, storage, clock)
    }

    /// Wire the application with explicit storage and clock.
    pub fn with_ports(
        config: AppConfig,
        storage: Arc<dyn WorldStorage>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        let registry = Arc::new(WorldRegistry::new());
        let worlds: Arc<dyn WorldProvider> = registry.clone();
        let quarantine = Arc::new(QuarantineStore::new(clock));

        let transfer = Arc::new(TransferEntity::new(
            worlds.clone(),
            quarantine.clone(),
            MigrationConfig {
                phase_timeout: config.migration_timeout,
            },
        ));
        let commands = CommandHandler::new(worlds, transfer.clone(), config.default_spawn);

        Self {
            use_cases: UseCases {
                transfer,
                load_worlds: LoadWorlds::new(storage),
            },
            config,
            registry,
            quarantine,
            commands,
        }
    }
}
