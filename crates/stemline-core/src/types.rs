//! Common types for Stemline
//!
//! Fundamental audio types shared by the engine, the capability backends and
//! the loader: stereo samples, pre-allocatable buffers and the index newtypes
//! the real-time side uses instead of string ids.

use std::ops::{Index, IndexMut};

/// Default engine sample rate (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Default frames per render quantum
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Upper bound on frames per callback; every buffer is pre-allocated to this
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Inputs per mixer node in the cascade
pub const MIXER_FAN_IN: usize = 4;

/// Audio sample type
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// `#[repr(C)]` keeps the layout `[left, right]` so `&[StereoSample]` can be
/// viewed as interleaved `&[f32]` through bytemuck without copying.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Same value in both channels
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Max of abs(left), abs(right)
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples
///
/// Buffers used on the audio thread are created with [`StereoBuffer::silence`]
/// or [`StereoBuffer::with_capacity`] at preparation time and only resized
/// inside their capacity afterwards.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create an empty buffer with room for `capacity` stereo frames
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Never allocates as long as `new_len <= capacity`. Newly exposed frames
    /// are silence.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let current_len = self.samples.len();
        if new_len > current_len {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Zero-copy interleaved view [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Add `other` scaled by `gain` into this buffer, frame by frame
    ///
    /// Only the overlapping prefix of the two buffers is touched.
    pub fn add_scaled(&mut self, other: &[StereoSample], gain: Sample) {
        for (dst, src) in self.samples.iter_mut().zip(other.iter()) {
            *dst += *src * gain;
        }
    }

    #[inline]
    pub fn push(&mut self, sample: StereoSample) {
        self.samples.push(sample);
    }

    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

/// Position of a track inside the loaded timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackIndex(pub usize);

/// Position of a region inside its track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionIndex(pub usize);

/// Identifies one loaded timeline instance
///
/// Bumped on every load so asset deliveries for a replaced instance can be
/// recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Convert seconds to a frame count at `sample_rate`, flooring
#[inline]
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_operations() {
        let a = StereoSample::new(1.0, 2.0);
        let b = StereoSample::new(0.5, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 1.5);
        assert_eq!(sum.right, 2.5);

        let scaled = a * 0.5;
        assert_eq!(scaled.left, 0.5);
        assert_eq!(scaled.right, 1.0);
    }

    #[test]
    fn test_set_len_from_capacity_keeps_allocation() {
        let mut buffer = StereoBuffer::silence(MAX_BUFFER_SIZE);
        let cap = buffer.capacity();
        buffer.set_len_from_capacity(128);
        assert_eq!(buffer.len(), 128);
        buffer.set_len_from_capacity(512);
        assert_eq!(buffer.len(), 512);
        assert_eq!(buffer.capacity(), cap);
    }

    #[test]
    fn test_add_scaled() {
        let mut dst = StereoBuffer::silence(2);
        let src = [StereoSample::mono(1.0), StereoSample::mono(2.0)];
        dst.add_scaled(&src, 0.5);
        assert_eq!(dst[0], StereoSample::mono(0.5));
        assert_eq!(dst[1], StereoSample::mono(1.0));
    }

    #[test]
    fn test_interleaved_view() {
        let buffer = StereoBuffer::from_vec(vec![StereoSample::new(1.0, 2.0), StereoSample::new(3.0, -4.0)]);
        assert_eq!(buffer.as_interleaved(), &[1.0, 2.0, 3.0, -4.0]);
        assert_eq!(buffer.peak(), 4.0);
    }

    #[test]
    fn test_seconds_to_frames_floors() {
        assert_eq!(seconds_to_frames(1.0, 48000), 48000);
        assert_eq!(seconds_to_frames(0.00001, 48000), 0);
        assert_eq!(seconds_to_frames(2.5, 48000), 120000);
        assert_eq!(seconds_to_frames(-1.0, 48000), 0);
        assert_eq!(seconds_to_frames(f64::NAN, 48000), 0);
    }
}
