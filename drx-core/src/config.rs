//! Configuration management for drx

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::heading::DEFAULT_HEADING_LEVELS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: ThemeVariant,
    pub outline: OutlineConfig,
    pub headings: HeadingsConfig,
    #[cfg(feature = "watch")]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeVariant {
    Dark,
    Light,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    pub enabled: bool,
    pub side: OutlineSide,
    pub width: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlineSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingsConfig {
    /// Heading levels the editor accepts (1-6)
    pub levels: Vec<u8>,
}

#[cfg(feature = "watch")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,
    pub auto_reload: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: ThemeVariant::Dark,
            outline: OutlineConfig::default(),
            headings: HeadingsConfig::default(),
            #[cfg(feature = "watch")]
            watch: WatchConfig::default(),
        }
    }
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            side: OutlineSide::Left,
            width: 32,
        }
    }
}

impl Default for HeadingsConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_HEADING_LEVELS.to_vec(),
        }
    }
}

#[cfg(feature = "watch")]
impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_reload: false,
        }
    }
}

impl Config {
    /// Get the platform-specific config file path
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "drx")
            .map(|proj_dirs| proj_dirs.config_dir().join("drx.toml"))
    }

    /// Load configuration from file, falling back to defaults if missing
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        // Check config file permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat config file: {}", path.display()))?;
            if metadata.permissions().mode() & 0o002 != 0 {
                anyhow::bail!(
                    "Config file {} is world-writable (insecure permissions)",
                    path.display()
                );
            }
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.sanitize();
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Replace unusable values with defaults
    fn sanitize(&mut self) {
        let levels = &self.headings.levels;
        if levels.is_empty() || levels.iter().any(|l| !(1..=6).contains(l)) {
            warn!(
                "Ignoring invalid heading levels {:?}, using {:?}",
                levels, DEFAULT_HEADING_LEVELS
            );
            self.headings.levels = DEFAULT_HEADING_LEVELS.to_vec();
        }
        if self.outline.width < 10 {
            warn!("Outline width {} is too narrow, using 10", self.outline.width);
            self.outline.width = 10;
        }
    }
}
