//! Player configuration
//!
//! Stored as YAML in the user's config directory.
//! Default location: ~/.config/stemline/player.yaml

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stemline_core::audio::AudioConfig;
use stemline_core::config::default_config_path;
use stemline_core::EngineConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub engine: EngineConfig,
    pub audio: AudioConfig,
    /// Base directory for relative asset URLs (None = working directory)
    pub asset_root: Option<PathBuf>,
}

pub fn player_config_path() -> PathBuf {
    default_config_path("player.yaml")
}
