use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::converter::usd::ExportSettings;

pub const CONFIG_FILE_NAME: &str = ".plyusdz.yaml";

/// Defaults read from `.plyusdz.yaml`. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub workers: usize,
    pub force_zero_order_sh: bool,
    pub overwrite: bool,
    pub export: ExportSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 1,
            force_zero_order_sh: true,
            overwrite: true,
            export: ExportSettings::default(),
        }
    }
}

impl Config {
    /// Load `.plyusdz.yaml` from the current directory, then the home directory.
    /// Falls back to defaults when neither exists.
    pub fn load() -> Result<Self> {
        let search_dirs: Vec<PathBuf> = std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::home_dir())
            .collect();
        Self::load_from(&search_dirs)
    }

    /// Load the first `.plyusdz.yaml` found in `search_dirs`, or defaults.
    pub fn load_from(search_dirs: &[PathBuf]) -> Result<Self> {
        match find_config_file(search_dirs) {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config '{}'", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config '{}'", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

fn find_config_file(search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.exists())
}
