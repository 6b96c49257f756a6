//! Configuration file for the pad driver
//!
//! A single TOML file describes the port wiring, which backend drives it and
//! the decoder tunables. A missing file is replaced by the defaults, so the
//! binary always starts.
//!
//! ```toml
//! backend = "gpio"
//! poll_interval_ms = 16
//!
//! [pins]
//! clock = 2
//! latch = 3
//! data0 = 4
//! data1 = 5
//! iobit = 6
//!
//! [settings]
//! mouse_precision = 1
//! mouse_speed_fail_threshold = 10
//! ```

use crate::bus::BusPins;
use crate::pad::PadSettings;
use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_DIR: &str = "snespad";
pub const CONFIG_FILE: &str = "snespad.toml";

/// What drives the controller port
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Raspberry Pi GPIO header
    #[default]
    Gpio,
    /// In-memory port with a SNES pad attached
    Simulated,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PadConfig {
    pub backend: Backend,
    /// Pause between poll cycles
    pub poll_interval_ms: u64,
    pub pins: BusPins,
    pub settings: PadSettings,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            poll_interval_ms: 16,
            pins: BusPins::default(),
            settings: PadSettings::default(),
        }
    }
}

impl PadConfig {
    /// `<config dir>/snespad/snespad.toml`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| eyre!("No configuration directory available"))?;
        Ok(base.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse pad config: {}", e))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize pad config: {}", e))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        tokio::fs::write(path, self.to_toml()?)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))
    }

    /// Load the file at `path` (or the default location), writing defaults if it is missing
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check for config file: {}", e))?;

        if exists {
            debug!("Loading pad config from {}", path.display());
            Self::load(&path).await
        } else {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save(&path).await?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config = PadConfig::from_toml(
            r#"
            backend = "simulated"

            [pins]
            clock = 17
            latch = 27
            data0 = 22
            data1 = 23
            iobit = 24

            [settings]
            mouse_precision = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Simulated);
        assert_eq!(config.pins, BusPins::new(17, 27, 22, 23, 24));
        assert_eq!(config.poll_interval_ms, 16);
        assert_eq!(config.settings.mouse_precision, 2);
        assert_eq!(config.settings.mouse_speed_fail_threshold, 10);
    }

    #[test]
    fn rejects_bad_backend() {
        assert!(PadConfig::from_toml(r#"backend = "serial""#).is_err());
    }

    #[tokio::test]
    async fn writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = PadConfig::load_or_default(Some(&path)).await.unwrap();
        assert_eq!(config, PadConfig::default());
        assert!(path.exists());

        let reloaded = PadConfig::load(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(&path, "poll_interval_ms = 5\n").await.unwrap();

        let config = PadConfig::load_or_default(Some(&path)).await.unwrap();
        assert_eq!(config.poll_interval_ms, 5);
        assert_eq!(config.backend, Backend::Gpio);
    }
}
