//! Mixing channel: regions, volume, mute/solo and bus effects

use crate::capability::{EffectCapability, EffectKind};
use crate::engine::region::Region;
use crate::types::{Sample, StereoBuffer, StereoSample, MAX_BUFFER_SIZE};

pub struct Track {
    id: String,
    regions: Vec<Region>,
    volume: Sample,
    muted: bool,
    soloed: bool,
    flanger: Option<Box<dyn EffectCapability>>,
    reverb: Option<Box<dyn EffectCapability>>,
    /// Accumulated output for the current quantum
    buffer: StereoBuffer,
    /// Per-region render target
    scratch: StereoBuffer,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        regions: Vec<Region>,
        flanger: Option<Box<dyn EffectCapability>>,
        reverb: Option<Box<dyn EffectCapability>>,
    ) -> Self {
        Self {
            id: id.into(),
            regions,
            volume: 1.0,
            muted: false,
            soloed: false,
            flanger,
            reverb,
            buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
            scratch: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn regions_mut(&mut self) -> &mut [Region] {
        &mut self.regions
    }

    pub fn volume(&self) -> Sample {
        self.volume
    }

    /// Clamped to 0.0-1.0
    pub fn set_volume(&mut self, volume: Sample) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_soloed(&self) -> bool {
        self.soloed
    }

    pub fn set_soloed(&mut self, soloed: bool) {
        self.soloed = soloed;
    }

    pub fn effect(&self, kind: EffectKind) -> Option<&dyn EffectCapability> {
        match kind {
            EffectKind::Flanger => self.flanger.as_deref(),
            EffectKind::Reverb => self.reverb.as_deref(),
        }
    }

    pub fn effect_mut(&mut self, kind: EffectKind) -> Option<&mut (dyn EffectCapability + 'static)> {
        match kind {
            EffectKind::Flanger => self.flanger.as_deref_mut(),
            EffectKind::Reverb => self.reverb.as_deref_mut(),
        }
    }

    /// Whether this track reaches the mix given the global solo state
    #[inline]
    pub fn is_audible(&self, any_soloed: bool) -> bool {
        !self.muted && (self.soloed || !any_soloed)
    }

    #[inline]
    pub fn effective_gain(&self, any_soloed: bool) -> Sample {
        if self.is_audible(any_soloed) {
            self.volume
        } else {
            0.0
        }
    }

    /// Render one quantum of `frames` frames starting at `cursor`
    ///
    /// Regions keep being scheduled while the track is silent so their
    /// playback positions stay in step with the cursor.
    pub fn process(&mut self, cursor: u64, frames: usize, any_soloed: bool) {
        let frames = frames.min(MAX_BUFFER_SIZE);
        self.buffer.set_len_from_capacity(frames);
        self.scratch.set_len_from_capacity(frames);
        self.buffer.fill_silence();

        let gain = self.effective_gain(any_soloed);
        for region in &mut self.regions {
            region.schedule(cursor, frames);
            if !region.is_playing() {
                continue;
            }
            region.render(self.scratch.as_mut_slice(), cursor);
            self.buffer.add_scaled(self.scratch.as_slice(), gain);
        }

        if let Some(flanger) = self.flanger.as_mut() {
            flanger.process(self.buffer.as_mut_slice());
        }
        if let Some(reverb) = self.reverb.as_mut() {
            reverb.process(self.buffer.as_mut_slice());
        }
    }

    /// Output of the last [`Track::process`] call
    pub fn output(&self) -> &[StereoSample] {
        self.buffer.as_slice()
    }

    pub fn deactivate_all(&mut self) {
        self.regions.iter_mut().for_each(Region::deactivate);
    }

    pub fn relocate_all(&mut self, cursor: u64) {
        for region in &mut self.regions {
            region.relocate(cursor);
        }
    }

    pub fn reset_effects(&mut self) {
        if let Some(flanger) = self.flanger.as_mut() {
            flanger.reset();
        }
        if let Some(reverb) = self.reverb.as_mut() {
            reverb.reset();
        }
    }
}
