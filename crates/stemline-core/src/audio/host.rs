//! cpal output stream driving a [`Timeline`]
//!
//! ```text
//! ┌──────────────────┐   commands    ┌─────────────────────┐
//! │ Control thread   │──────────────►│  rtrb rings         │
//! │ (controller)     │◄──────────────│                     │
//! └──────────────────┘   events      └──────────┬──────────┘
//!                                               │
//!                                    ┌──────────▼──────────┐
//!                                    │  cpal audio thread  │
//!                                    │  (owns Timeline)    │
//!                                    └─────────────────────┘
//! ```
//!
//! The callback owns the timeline outright; nothing is shared behind a lock.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::AudioConfig;
use super::device::{default_device, find_device};
use super::error::{AudioError, AudioResult};
use crate::engine::Timeline;
use crate::types::{StereoBuffer, StereoSample, MAX_BUFFER_SIZE};

/// A negotiated but not yet running output
pub struct AudioOutput {
    device: cpal::Device,
    stream_config: StreamConfig,
    device_name: String,
}

impl AudioOutput {
    /// Pick the device and stream configuration for `config`
    ///
    /// Prefers f32 stereo at the requested rate. When the device cannot run
    /// at that rate its maximum rate is used; read it back with
    /// [`AudioOutput::sample_rate`] before preparing timelines.
    pub fn open(config: &AudioConfig) -> AudioResult<Self> {
        let device = match &config.device {
            Some(name) => find_device(name)?,
            None => default_device()?,
        };
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = get_output_config(&device, config)?;
        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: match config.buffer_size.as_frames() {
                Some(frames) => CpalBufferSize::Fixed(frames),
                None => CpalBufferSize::Default,
            },
        };

        log::info!(
            "audio device {}: {} channels, {} Hz, buffer {:?}",
            device_name,
            stream_config.channels,
            stream_config.sample_rate.0,
            config.buffer_size
        );

        Ok(Self {
            device,
            stream_config,
            device_name,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.stream_config.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Move `timeline` into the audio callback and start the stream
    pub fn start(self, timeline: Timeline) -> AudioResult<AudioHandle> {
        let stream = build_output_stream(&self.device, &self.stream_config, timeline)?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
        log::info!("audio stream started on {}", self.device_name);

        let buffer_size = match self.stream_config.buffer_size {
            CpalBufferSize::Fixed(frames) => Some(frames),
            CpalBufferSize::Default => None,
        };
        Ok(AudioHandle {
            _stream: stream,
            sample_rate: self.sample_rate(),
            buffer_size,
        })
    }
}

/// Keeps the stream alive; drop it to stop audio
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: Option<u32>,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> Option<u32> {
        self.buffer_size
    }

    /// One-way output latency, when the buffer size is fixed
    pub fn latency_ms(&self) -> Option<f32> {
        self.buffer_size
            .map(|frames| (frames as f32 / self.sample_rate as f32) * 1000.0)
    }
}

fn get_output_config(device: &cpal::Device, config: &AudioConfig) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target = config.sample_rate;
    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        target >= c.min_sample_rate().0 && target <= c.max_sample_rate().0
    };

    let best = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        .find(in_range)
        .or_else(|| {
            supported
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        })
        .or_else(|| supported.iter().find(|c| c.sample_format() == SampleFormat::F32))
        .ok_or_else(|| {
            AudioError::UnsupportedFormat("device offers no f32 output configuration".to_string())
        })?;

    let sample_rate = if in_range(&best) {
        cpal::SampleRate(target)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "device doesn't support {} Hz, falling back to {} Hz (assets will be resampled)",
            target,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut timeline: Timeline,
) -> AudioResult<Stream> {
    let channels = (config.channels as usize).max(1);
    let mut scratch = StereoBuffer::silence(MAX_BUFFER_SIZE);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
                    scratch.set_len_from_capacity(chunk.len() / channels);
                    timeline.process(scratch.as_mut_slice());
                    write_interleaved(scratch.as_slice(), chunk, channels);
                }
            },
            move |err| {
                log::error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}

/// Copy stereo frames into a device buffer with `channels` channels
///
/// Mono devices get the left channel. Channels past the second and frames past
/// the end of `samples` are silenced.
pub fn write_interleaved(samples: &[StereoSample], out: &mut [f32], channels: usize) {
    if channels == 0 {
        return;
    }
    for (i, frame) in out.chunks_mut(channels).enumerate() {
        match samples.get(i) {
            Some(sample) => {
                frame[0] = sample.left;
                if channels > 1 {
                    frame[1] = sample.right;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
            None => frame.fill(0.0),
        }
    }
}
