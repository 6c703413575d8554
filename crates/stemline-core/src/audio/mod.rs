//! Audio output through cpal
//!
//! The audio thread owns the [`Timeline`](crate::engine::Timeline)
//! exclusively. The control side talks to it only through the rtrb rings in
//! [`ControlPorts`](crate::engine::ControlPorts).
//!
//! ```ignore
//! use stemline_core::audio::{AudioConfig, AudioOutput};
//!
//! let output = AudioOutput::open(&AudioConfig::default())?;
//! let mut engine_config = EngineConfig::default();
//! engine_config.sample_rate = output.sample_rate();
//! let (timeline, ports) = timeline_channels(&engine_config);
//! let handle = output.start(timeline)?;
//! ```

mod config;
mod device;
mod error;
mod host;

pub use config::{AudioConfig, BufferSize};
pub use device::{default_device, find_device, get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
pub use host::{write_interleaved, AudioHandle, AudioOutput};
