//! Multiworld Engine - Main entry point.
//!
//! Loads every world under the worlds folder, drops a console player into
//! the first one and reads world commands from stdin as that player.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multiworld_domain::{Entity, EntityName};
use multiworld_engine::api::CommandOutcome;
use multiworld_engine::entities::EntityHandle;
use multiworld_engine::infrastructure::config::AppConfig;
use multiworld_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root so `cargo run` works from any crate dir.
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multiworld_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Multiworld Engine");

    let config = AppConfig::from_env();
    tracing::info!(
        worlds_dir = %config.worlds_dir.display(),
        migration_timeout_ms = config.migration_timeout.as_millis() as u64,
        default_spawn = %config.default_spawn,
        "Configuration loaded"
    );

    let app = App::new(config);
    let summary = app
        .use_cases
        .load_worlds
        .execute(&app.registry)
        .await
        .context("failed to load worlds")?;

    let Some(home) = app.registry.worlds().into_iter().next() else {
        tracing::warn!(
            worlds_dir = %app.config.worlds_dir.display(),
            skipped = summary.skipped.len(),
            "No worlds loaded; create a subdirectory per world and restart"
        );
        return Ok(());
    };

    let name = EntityName::new(app.config.console_player.as_str())
        .context("invalid CONSOLE_PLAYER")?;
    let player = EntityHandle::new(Entity::player(name, home.settings().spawn));
    player
        .spawn_into(&home)
        .await
        .context("failed to spawn console player")?;
    println!(
        "{} joined world {}. Try `/world list` or `/world tp <name>`.",
        player.name(),
        home.name()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match app.commands.dispatch_line(&player, &line).await {
            Ok(CommandOutcome::Migrating(task)) => {
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "Migration task panicked");
                }
            }
            Ok(CommandOutcome::Replied | CommandOutcome::Ignored) => {}
            Err(e) => println!("{e}"),
        }

        for message in drain_inbox(&player).await {
            println!("{message}");
        }
    }

    if !app.quarantine.is_empty() {
        tracing::warn!(count = app.quarantine.len(), "Exiting with quarantined entities");
    }
    player.close().await;
    for world in app.registry.worlds() {
        world.close();
    }
    tracing::info!("Multiworld Engine stopped");
    Ok(())
}

async fn drain_inbox(player: &EntityHandle) -> Vec<String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let ran = player
        .exec_world(move |_, entity| {
            let _ = tx.send(entity.drain_inbox());
        })
        .await;
    if !ran {
        return Vec::new();
    }
    rx.await.unwrap_or_default()
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
