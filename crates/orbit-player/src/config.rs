//! Player configuration and YAML persistence
//!
//! One file holds the engine settings, the OSC backend and the demo
//! trajectory. Missing sections fall back to their defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use orbit_core::EngineConfig;
use orbit_osc::BackendConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub engine: EngineConfig,
    pub backend: BackendConfig,
    pub demo: DemoConfig,
}

/// Circular trajectory played at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub channel: usize,
    pub radius: f32,
    pub elevation: f32,
    pub revolutions: f32,
    pub length_bars: i32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            radius: 1.0,
            elevation: 0.0,
            revolutions: 1.0,
            length_bars: 4,
        }
    }
}

/// `<config dir>/orbit/player.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("orbit")
        .join("player.yaml")
}

/// Load configuration from a YAML file
///
/// A missing file yields the defaults. An unreadable or invalid file is
/// logged and also yields the defaults.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("load_config: Failed to read config file: {}, using defaults", e);
            return T::default();
        }
    };
    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("load_config: Failed to parse config: {}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    log::info!("save_config: Saved {:?}", path);
    Ok(())
}
