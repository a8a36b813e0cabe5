//! File system paths for the client core.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths under the app's base directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.venered)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.venered`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".venered"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.venered).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.venered/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the persisted session file path (~/.venered/session.json).
    pub fn session_file(&self) -> PathBuf {
        self.base_dir.join("session.json")
    }

    /// Ensure the base directory exists.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_base_dir() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/venered-test"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/venered-test/config.json")
        );
        assert_eq!(
            paths.session_file(),
            PathBuf::from("/tmp/venered-test/session.json")
        );
    }
}
