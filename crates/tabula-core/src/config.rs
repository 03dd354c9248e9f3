//! Application configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the spreadsheet database
    pub data_dir: PathBuf,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Load a JSON config file. A missing `data_dir` falls back to the
    /// platform data directory.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;

        #[derive(Deserialize)]
        struct Partial {
            data_dir: Option<PathBuf>,
        }

        let partial: Partial = serde_json::from_str(&raw)?;
        let config = match partial.data_dir {
            Some(dir) => Self::new(dir),
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CoreError::Config("data_dir cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Platform data directory for Tabula, `.tabula` when none is known
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Tabula"))
            .unwrap_or_else(|| PathBuf::from(".tabula"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}
