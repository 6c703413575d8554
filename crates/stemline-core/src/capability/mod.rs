//! DSP capability boundary
//!
//! The scheduler never renders, filters or sums audio itself. It drives three
//! kinds of capability objects through the traits below:
//! - [`AudioPlayerCapability`]: plays one decoded asset from a frame position
//! - [`EffectCapability`]: an in-place stereo bus effect (reverb, flanger)
//! - [`MixerCapability`]: sums up to [`MIXER_FAN_IN`] stereo inputs
//!
//! Instances are obtained from a [`CapabilityProvider`] while a timeline is
//! prepared on the control thread. Every method except construction must be
//! real-time safe: no allocation, no locks, no IO.

pub mod native;

pub use native::NativeProvider;

use basedrop::Shared;

use crate::asset::AssetBuffer;
use crate::error::CapabilityAllocationError;
use crate::types::{StereoSample, MIXER_FAN_IN};

/// A player for one in-memory asset
pub trait AudioPlayerCapability: Send {
    /// Attach a decoded asset; the previous one is released through the collector
    fn open_memory(&mut self, asset: Shared<AssetBuffer>);

    /// Whether an asset is attached
    fn is_open(&self) -> bool;

    fn play(&mut self);

    fn pause(&mut self);

    fn is_playing(&self) -> bool;

    /// Seek to a fraction (0.0-1.0) of the asset length
    fn seek(&mut self, fraction: f64);

    /// Seek to an absolute frame of the asset
    fn set_position(&mut self, frame: u64);

    /// Current playback frame
    fn position(&self) -> u64;

    /// Asset length in frames, 0 when nothing is open
    fn duration_frames(&self) -> u64;

    /// Render `out.len()` frames scaled by `gain`
    ///
    /// With `append` the rendered audio is added to `out`, otherwise it
    /// replaces it. Returns `true` if any audio was produced; when nothing was
    /// produced and `append` is false, `out` is left silent.
    fn process_stereo(&mut self, out: &mut [StereoSample], append: bool, gain: f32) -> bool;
}

/// Bus effect flavours a track can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Reverb,
    Flanger,
}

impl EffectKind {
    pub const ALL: [EffectKind; 2] = [EffectKind::Reverb, EffectKind::Flanger];

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Reverb => "reverb",
            EffectKind::Flanger => "flanger",
        }
    }
}

/// Effect parameters addressable by command
///
/// Not every parameter applies to every effect; see [`EffectCapability::set_param`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectParam {
    /// Dry/wet balance (0.0 = dry, 1.0 = wet)
    Mix,
    RoomSize,
    Damping,
    Width,
    Depth,
    /// LFO rate in Hz
    Rate,
    Feedback,
}

/// An in-place stereo effect
pub trait EffectCapability: Send {
    fn kind(&self) -> EffectKind;

    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn set_mix(&mut self, mix: f32);

    fn mix(&self) -> f32;

    /// Set a parameter in its natural unit, clamped into range
    ///
    /// Returns `false` if this effect has no such parameter.
    fn set_param(&mut self, param: EffectParam, value: f32) -> bool;

    fn param(&self, param: EffectParam) -> Option<f32>;

    /// Process `buffer` in place
    fn process(&mut self, buffer: &mut [StereoSample]);

    /// Clear internal state (delay lines, filters)
    fn reset(&mut self);
}

/// A fixed fan-in stereo summing node
pub trait MixerCapability: Send {
    /// Sum the present inputs into `out`
    ///
    /// Missing inputs count as silence. Every present input is at least
    /// `out.len()` frames long.
    fn process(&mut self, inputs: [Option<&[StereoSample]>; MIXER_FAN_IN], out: &mut [StereoSample]);
}

/// Factory for capability instances
///
/// Called on the control thread only. Failures are reported per slot; the
/// engine degrades that slot to silence.
pub trait CapabilityProvider: Send + Sync {
    fn create_player(
        &self,
        sample_rate: u32,
    ) -> Result<Box<dyn AudioPlayerCapability>, CapabilityAllocationError>;

    fn create_effect(
        &self,
        kind: EffectKind,
        sample_rate: u32,
    ) -> Result<Box<dyn EffectCapability>, CapabilityAllocationError>;

    fn create_mixer(&self) -> Result<Box<dyn MixerCapability>, CapabilityAllocationError>;
}

/// Range description for one effect parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamInfo {
    pub param: EffectParam,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

impl ParamInfo {
    pub const fn new(param: EffectParam, default: f32, min: f32, max: f32) -> Self {
        Self { param, default, min, max }
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Shared bookkeeping for effect implementations: enable flag plus a fixed
/// table of parameter values
#[derive(Debug, Clone)]
pub struct EffectState<const N: usize> {
    kind: EffectKind,
    enabled: bool,
    infos: [ParamInfo; N],
    values: [f32; N],
}

impl<const N: usize> EffectState<N> {
    pub fn new(kind: EffectKind, infos: [ParamInfo; N]) -> Self {
        let values = infos.map(|info| info.default);
        Self {
            kind,
            enabled: false,
            infos,
            values,
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `false` for unknown parameters or non-finite values
    pub fn set(&mut self, param: EffectParam, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self.infos.iter().position(|info| info.param == param) {
            Some(idx) => {
                self.values[idx] = self.infos[idx].clamp(value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, param: EffectParam) -> Option<f32> {
        self.infos
            .iter()
            .position(|info| info.param == param)
            .map(|idx| self.values[idx])
    }

    /// Value of a parameter known to exist, 0.0 otherwise
    #[inline]
    pub fn value(&self, param: EffectParam) -> f32 {
        self.get(param).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFOS: [ParamInfo; 2] = [
        ParamInfo::new(EffectParam::Mix, 0.3, 0.0, 1.0),
        ParamInfo::new(EffectParam::Rate, 0.5, 0.05, 10.0),
    ];

    #[test]
    fn test_effect_state_defaults() {
        let state = EffectState::new(EffectKind::Flanger, INFOS);
        assert!(!state.is_enabled());
        assert_eq!(state.get(EffectParam::Mix), Some(0.3));
        assert_eq!(state.get(EffectParam::RoomSize), None);
    }

    #[test]
    fn test_effect_state_clamps() {
        let mut state = EffectState::new(EffectKind::Flanger, INFOS);
        assert!(state.set(EffectParam::Rate, 100.0));
        assert_eq!(state.value(EffectParam::Rate), 10.0);
        assert!(state.set(EffectParam::Mix, -1.0));
        assert_eq!(state.value(EffectParam::Mix), 0.0);
    }

    #[test]
    fn test_effect_state_rejects_unknown_and_nan() {
        let mut state = EffectState::new(EffectKind::Reverb, INFOS);
        assert!(!state.set(EffectParam::Damping, 0.5));
        assert!(!state.set(EffectParam::Mix, f32::NAN));
        assert_eq!(state.value(EffectParam::Mix), 0.3);
    }
}
