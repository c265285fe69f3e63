//! Local identity cache
//!
//! Remembers who is logged in on this device across restarts. A single
//! JSON file in the platform config directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::UserIdentity;

const CACHE_FILE: &str = "identity.json";

pub struct IdentityCache {
    path: PathBuf,
}

impl IdentityCache {
    /// Cache in the default config directory
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "nightcap", "nightcap").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        Ok(Self::with_path(dirs.config_dir().join(CACHE_FILE)))
    }

    /// Cache at a custom location (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The remembered identity, if any
    pub fn load(&self) -> Result<Option<UserIdentity>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, identity: &UserIdentity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(identity)?)?;
        debug!(username = %identity.username, "Identity cached");
        Ok(())
    }

    /// Forget the remembered identity (logout)
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
