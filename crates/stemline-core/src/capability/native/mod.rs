//! Pure Rust capability backend

mod flanger;
mod mixer;
mod player;
mod reverb;

pub use flanger::FlangerEffect;
pub use mixer::SummingMixer;
pub use player::MemoryPlayer;
pub use reverb::ReverbEffect;

use super::{
    AudioPlayerCapability, CapabilityProvider, EffectCapability, EffectKind, MixerCapability,
};
use crate::error::{CapabilityAllocationError, CapabilityKind};

/// Provider backed by the native implementations in this module
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProvider;

impl NativeProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CapabilityProvider for NativeProvider {
    fn create_player(
        &self,
        _sample_rate: u32,
    ) -> Result<Box<dyn AudioPlayerCapability>, CapabilityAllocationError> {
        Ok(Box::new(MemoryPlayer::new()))
    }

    fn create_effect(
        &self,
        kind: EffectKind,
        sample_rate: u32,
    ) -> Result<Box<dyn EffectCapability>, CapabilityAllocationError> {
        if sample_rate == 0 {
            return Err(CapabilityAllocationError::new(
                CapabilityKind::Effect,
                "sample rate must be non-zero",
            ));
        }
        Ok(match kind {
            EffectKind::Reverb => Box::new(ReverbEffect::new(sample_rate)),
            EffectKind::Flanger => Box::new(FlangerEffect::new(sample_rate)),
        })
    }

    fn create_mixer(&self) -> Result<Box<dyn MixerCapability>, CapabilityAllocationError> {
        Ok(Box::new(SummingMixer))
    }
}
