//! Output device configuration

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE, SAMPLE_RATE};

/// Preferred callback size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the device choose
    #[default]
    Default,
    /// Request a fixed number of frames, clamped to `[32, MAX_BUFFER_SIZE]`
    Fixed(u32),
}

impl BufferSize {
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some((*frames).clamp(32, MAX_BUFFER_SIZE as u32)),
        }
    }

    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate as f32) * 1000.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name (None = system default)
    pub device: Option<String>,
    pub buffer_size: BufferSize,
    /// Preferred device rate; the engine runs at whatever the device grants
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_size: BufferSize::Fixed(DEFAULT_BUFFER_SIZE as u32),
            sample_rate: SAMPLE_RATE,
        }
    }
}

impl AudioConfig {
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_clamped() {
        assert_eq!(BufferSize::Fixed(4).as_frames(), Some(32));
        assert_eq!(BufferSize::Fixed(1 << 20).as_frames(), Some(MAX_BUFFER_SIZE as u32));
        assert_eq!(BufferSize::Default.as_frames(), None);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = AudioConfig::default().with_device("hw:1").with_buffer_frames(256);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AudioConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
