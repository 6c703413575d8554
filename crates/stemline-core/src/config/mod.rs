//! Engine configuration
//!
//! ```ignore
//! use stemline_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path("config.yaml"));
//! ```

mod io;

pub use io::{load_config, save_config};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{COMMAND_QUEUE_CAPACITY, DIAGNOSTIC_QUEUE_CAPACITY, EVENT_QUEUE_CAPACITY};
use crate::asset::ASSET_QUEUE_CAPACITY;
use crate::types::{DEFAULT_BUFFER_SIZE, SAMPLE_RATE};

/// Scheduler and loader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine rate; assets are resampled to it
    pub sample_rate: u32,
    /// Frames per quantum when the host lets us choose
    pub buffer_size: u32,
    /// Emit a cursor event every N quanta while playing
    pub cursor_event_interval: u32,
    pub command_queue_capacity: usize,
    pub event_queue_capacity: usize,
    pub asset_queue_capacity: usize,
    pub diagnostic_queue_capacity: usize,
    /// Per-asset fetch and decode deadline
    pub asset_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE as u32,
            cursor_event_interval: 8,
            command_queue_capacity: COMMAND_QUEUE_CAPACITY,
            event_queue_capacity: EVENT_QUEUE_CAPACITY,
            asset_queue_capacity: ASSET_QUEUE_CAPACITY,
            diagnostic_queue_capacity: DIAGNOSTIC_QUEUE_CAPACITY,
            asset_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms)
    }
}

/// `<config dir>/stemline/<filename>`, falling back to the working directory
pub fn default_config_path(filename: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stemline")
        .join(filename)
}
