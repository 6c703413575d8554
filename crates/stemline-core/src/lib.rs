//! Stemline Core - sample-accurate multi-track timeline playback
//!
//! A [`Timeline`](engine::Timeline) runs on the audio thread and schedules
//! regions of decoded assets across tracks. A
//! [`TimelineController`](controller::TimelineController) on the control
//! thread turns JSON protocol messages into commands, loads assets in the
//! background and translates engine events back into protocol messages.

pub mod asset;
pub mod audio;
pub mod capability;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod loader;
pub mod protocol;
pub mod types;

pub use types::*;

pub use config::EngineConfig;
pub use controller::{LoadReport, TimelineController};
pub use engine::{timeline_channels, ControlPorts, Reclaimer, Timeline};
