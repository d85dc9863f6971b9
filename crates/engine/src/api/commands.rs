//! World commands.
//!
//! `/world list` and `/world teleport <name> [x y z]` (alias `tp`), also
//! reachable as `/multiworld` and `/mw`. Replies land in the issuing
//! player's inbox, delivered inside whichever world the player is in when
//! the reply is sent.

use std::sync::Arc;

use tokio::task::JoinHandle;

use multiworld_domain::Position;

use crate::entities::EntityHandle;
use crate::infrastructure::ports::WorldProvider;
use crate::use_cases::migration::{MigrationError, MigrationReport, TransferEntity};

/// Registered command name.
pub const COMMAND_NAME: &str = "multiworld";
/// Alternative names for [`COMMAND_NAME`].
pub const COMMAND_ALIASES: &[&str] = &["mw", "world"];
/// Reply for a malformed or unknown subcommand.
pub const USAGE: &str = "Usage: /world teleport <name>";

/// A parsed world command.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldCommand {
    List,
    Teleport {
        world: Option<String>,
        position: Option<Position>,
    },
    /// Missing or unrecognised subcommand
    Usage,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

impl WorldCommand {
    /// Parse a command line such as `/world tp beta 10 70 5`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let mut args = line.split_whitespace();

        let name = args.next().ok_or(CommandError::Empty)?;
        if !is_command_name(name) {
            return Err(CommandError::UnknownCommand(name.to_string()));
        }

        let Some(sub) = args.next() else {
            return Ok(WorldCommand::Usage);
        };
        match sub.to_ascii_lowercase().as_str() {
            "list" => Ok(WorldCommand::List),
            "teleport" | "tp" => {
                let world = args.next().map(str::to_string);
                let coords: Vec<&str> = args.collect();
                let position = match coords.as_slice() {
                    [] => None,
                    [x, y, z] => Some(
                        Position::from_components(x, y, z)
                            .map_err(|e| CommandError::InvalidCoordinates(e.to_string()))?,
                    ),
                    other => {
                        return Err(CommandError::InvalidCoordinates(format!(
                            "expected x y z, got {} values",
                            other.len()
                        )))
                    }
                };
                Ok(WorldCommand::Teleport { world, position })
            }
            _ => Ok(WorldCommand::Usage),
        }
    }
}

fn is_command_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(COMMAND_NAME)
        || COMMAND_ALIASES.iter().any(|a| name.eq_ignore_ascii_case(a))
}

/// What a dispatched command left behind.
#[derive(Debug)]
pub enum CommandOutcome {
    /// The source is not a player; nothing happened
    Ignored,
    /// A reply was delivered (or the source had already gone)
    Replied,
    /// A migration is running; the task replies to the player when done
    Migrating(JoinHandle<Result<MigrationReport, MigrationError>>),
}

/// Runs world commands on behalf of player entities.
pub struct CommandHandler {
    worlds: Arc<dyn WorldProvider>,
    transfer: Arc<TransferEntity>,
    default_spawn: Position,
}

impl CommandHandler {
    pub fn new(
        worlds: Arc<dyn WorldProvider>,
        transfer: Arc<TransferEntity>,
        default_spawn: Position,
    ) -> Self {
        Self {
            worlds,
            transfer,
            default_spawn,
        }
    }

    /// Parse and run one command line.
    pub async fn dispatch_line(
        &self,
        source: &EntityHandle,
        line: &str,
    ) -> Result<CommandOutcome, CommandError> {
        match WorldCommand::parse(line) {
            Ok(command) => Ok(self.dispatch(source, command).await),
            Err(CommandError::InvalidCoordinates(reason)) if source.is_player() => {
                reply(source, format!("Invalid coordinates: {reason}")).await;
                Ok(CommandOutcome::Replied)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn dispatch(&self, source: &EntityHandle, command: WorldCommand) -> CommandOutcome {
        if !source.is_player() {
            tracing::debug!(entity_id = %source.id(), "Ignoring world command from non-player");
            return CommandOutcome::Ignored;
        }

        match command {
            WorldCommand::List => {
                let names = self.worlds.world_names();
                reply(source, format!("Worlds available: {}", names.join(", "))).await;
                CommandOutcome::Replied
            }
            WorldCommand::Teleport {
                world: Some(world),
                position,
            } if !world.trim().is_empty() => {
                let position = position.unwrap_or(self.default_spawn);
                self.teleport(source, world, position).await
            }
            WorldCommand::Teleport { .. } | WorldCommand::Usage => {
                reply(source, USAGE).await;
                CommandOutcome::Replied
            }
        }
    }

    async fn teleport(&self, source: &EntityHandle, world: String, position: Position) -> CommandOutcome {
        reply(source, format!("Sending you to world {world}...")).await;

        let transfer = Arc::clone(&self.transfer);
        let player = source.clone();
        let task = tokio::spawn(async move {
            let result = transfer.transfer_player(&player, &world, position).await;
            let text = match &result {
                Ok(_) => format!("Successfully moved to world {world}"),
                Err(e) => format!("Failed to move to {world}: {e}"),
            };
            reply(&player, text).await;
            result
        });
        CommandOutcome::Migrating(task)
    }
}

/// Deliver `text` to the player inside its current world.
async fn reply(player: &EntityHandle, text: impl Into<String>) {
    let text = text.into();
    tracing::debug!(entity_id = %player.id(), entity = %player.name(), message = %text, "Reply");
    let delivered = player
        .exec_world(move |_, entity| entity.message(text))
        .await;
    if !delivered {
        tracing::debug!(entity_id = %player.id(), "Reply dropped, player is in no world");
    }
}
