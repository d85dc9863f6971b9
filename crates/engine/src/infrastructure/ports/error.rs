//! Error types for port operations.

/// World storage errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The storage root could not be created or read.
    #[error("Storage root {path}: {message}")]
    Root { path: String, message: String },

    /// A single world could not be opened.
    #[error("Failed to open world {world}: {message}")]
    Open { world: String, message: String },

    /// World settings could not be parsed.
    #[error("Invalid settings for world {world}: {message}")]
    Serialization { world: String, message: String },
}

impl StorageError {
    pub fn root(path: impl ToString, message: impl ToString) -> Self {
        Self::Root {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    pub fn open(world: impl ToString, message: impl ToString) -> Self {
        Self::Open {
            world: world.to_string(),
            message: message.to_string(),
        }
    }

    pub fn serialization(world: impl ToString, message: impl ToString) -> Self {
        Self::Serialization {
            world: world.to_string(),
            message: message.to_string(),
        }
    }
}
