//! Filesystem world storage.
//!
//! Layout:
//!
//! ```text
//! worlds/
//!   alpha/
//!     world.json   (optional WorldSettings)
//!   beta/
//! ```
//!
//! Every subdirectory of the root is one world, named after the directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::infrastructure::ports::{StorageError, WorldStorage};
use crate::infrastructure::world_runtime::WorldSettings;

/// File inside a world directory holding its settings.
pub const SETTINGS_FILE: &str = "world.json";

/// World storage backed by a directory tree.
pub struct FsWorldStorage {
    root: PathBuf,
}

impl FsWorldStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl WorldStorage for FsWorldStorage {
    async fn ensure_root(&self) -> Result<(), StorageError> {
        if tokio::fs::try_exists(&self.root)
            .await
            .map_err(|e| StorageError::root(self.root.display(), e))?
        {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::root(self.root.display(), e))?;
        tracing::info!(path = %self.root.display(), "Created worlds folder");
        Ok(())
    }

    async fn list_worlds(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::root(self.root.display(), e))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::root(self.root.display(), e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::warn!(name = ?raw, "Skipping world directory with non UTF-8 name");
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open_world(&self, name: &str) -> Result<WorldSettings, StorageError> {
        let dir = self.root.join(name);
        let meta = tokio::fs::metadata(&dir)
            .await
            .map_err(|e| StorageError::open(name, e))?;
        if !meta.is_dir() {
            return Err(StorageError::open(name, "not a directory"));
        }

        let settings_path = dir.join(SETTINGS_FILE);
        match tokio::fs::read_to_string(&settings_path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| StorageError::serialization(name, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(WorldSettings::default()),
            Err(e) => Err(StorageError::open(name, e)),
        }
    }
}
