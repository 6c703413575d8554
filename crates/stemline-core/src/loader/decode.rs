//! Decoding encoded asset bytes to stereo with symphonia

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::asset::AssetFailureKind;
use crate::types::{StereoBuffer, StereoSample};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("no audio frames decoded")]
    Empty,
}

impl DecodeError {
    pub fn kind(&self) -> AssetFailureKind {
        match self {
            DecodeError::Unsupported(_) => AssetFailureKind::Unsupported,
            DecodeError::Decode(_) | DecodeError::Empty => AssetFailureKind::Decode,
        }
    }
}

/// Decoded audio at its native rate
#[derive(Debug)]
pub struct DecodedAudio {
    pub samples: StereoBuffer,
    pub sample_rate: u32,
}

/// File extension of a URL or path, ignoring query and fragment
pub fn extension_hint(url: &str) -> Option<&str> {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    Path::new(path).extension().and_then(|e| e.to_str())
}

/// Decode a whole asset into a stereo buffer
///
/// Mono is duplicated to both channels; streams with more than two channels
/// keep the first two.
pub fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Unsupported("no audio track".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Unsupported("unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut samples = StereoBuffer::with_capacity(
        track.codec_params.n_frames.unwrap_or(0).min(u32::MAX as u64) as usize,
    );
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut buf_frames = 0u64;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            continue;
        }
        let needed = decoded.capacity() as u64;
        if sample_buf.is_none() || needed > buf_frames {
            sample_buf = Some(SampleBuffer::new(needed, spec));
            buf_frames = needed;
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks_exact(channels) {
            let sample = match frame {
                [mono] => StereoSample::mono(*mono),
                [left, right, ..] => StereoSample::new(*left, *right),
                [] => continue,
            };
            samples.push(sample);
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(DecodedAudio { samples, sample_rate })
}
