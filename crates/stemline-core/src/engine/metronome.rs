//! Click track triggered on beat boundaries

use basedrop::Shared;

use crate::asset::{AssetBuffer, AssetIndex};
use crate::capability::AudioPlayerCapability;
use crate::types::{StereoBuffer, StereoSample, MAX_BUFFER_SIZE};

pub struct Metronome {
    asset: AssetIndex,
    /// Beat length in frames
    beat_frames: f64,
    enabled: bool,
    loaded: bool,
    player: Option<Box<dyn AudioPlayerCapability>>,
    buffer: StereoBuffer,
}

impl Metronome {
    /// Caller guarantees `bpm > 0`
    pub fn new(
        asset: AssetIndex,
        bpm: f64,
        sample_rate: u32,
        player: Option<Box<dyn AudioPlayerCapability>>,
    ) -> Self {
        Self {
            asset,
            beat_frames: 60.0 / bpm * sample_rate as f64,
            enabled: false,
            loaded: false,
            player,
            buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    pub fn asset(&self) -> AssetIndex {
        self.asset
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            if let Some(player) = self.player.as_mut() {
                player.pause();
            }
        }
    }

    pub fn load(&mut self, buffer: Shared<AssetBuffer>) {
        if let Some(player) = self.player.as_mut() {
            player.open_memory(buffer);
            self.loaded = true;
        }
    }

    /// Render the quantum `[cursor, cursor + frames)`
    pub fn process(&mut self, cursor: u64, frames: usize) {
        let frames = frames.min(MAX_BUFFER_SIZE);
        self.buffer.set_len_from_capacity(frames);
        self.buffer.fill_silence();
        if !self.enabled || !self.loaded || self.beat_frames < 1.0 {
            return;
        }
        let beat_frames = self.beat_frames;
        let Some(player) = self.player.as_mut() else {
            return;
        };

        let out = self.buffer.as_mut_slice();
        let window_end = cursor + frames as u64;
        let mut written = 0usize;
        let mut beat = first_beat_at_or_after(cursor, beat_frames);
        loop {
            let frame = beat_frame(beat, beat_frames);
            if frame >= window_end {
                break;
            }
            let offset = (frame.saturating_sub(cursor) as usize).clamp(written, frames);
            // Tail of the previous click up to the new trigger
            player.process_stereo(&mut out[written..offset], false, 1.0);
            player.set_position(0);
            player.play();
            written = offset;
            beat += 1;
        }
        player.process_stereo(&mut out[written..frames], false, 1.0);
    }

    /// Drop any click in progress (seek, stop)
    pub fn relocate(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.pause();
        }
    }

    pub fn output(&self) -> &[StereoSample] {
        self.buffer.as_slice()
    }
}

/// Trigger frame of `beat`; the one rounding every boundary check goes through
#[inline]
fn beat_frame(beat: u64, beat_frames: f64) -> u64 {
    (beat as f64 * beat_frames).round() as u64
}

/// Lowest beat whose trigger frame is `>= cursor`
fn first_beat_at_or_after(cursor: u64, beat_frames: f64) -> u64 {
    let mut beat = (cursor as f64 / beat_frames).ceil() as u64;
    while beat > 0 && beat_frame(beat - 1, beat_frames) >= cursor {
        beat -= 1;
    }
    while beat_frame(beat, beat_frames) < cursor {
        beat += 1;
    }
    beat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::native::MemoryPlayer;
    use crate::engine::region::tests::constant_asset;
    use basedrop::Collector;

    #[test]
    fn test_click_on_beat_boundary() {
        let collector = Collector::new();
        // 120 bpm at 48kHz: one beat every 24000 frames
        let mut metronome = Metronome::new(AssetIndex(0), 120.0, 48000, Some(Box::new(MemoryPlayer::new())));
        metronome.load(constant_asset(&collector.handle(), 10));
        metronome.set_enabled(true);

        // Beat at 24000 falls 64 frames into this quantum
        metronome.process(23936, 128);
        let out = metronome.output();
        assert!(out[..64].iter().all(|s| *s == StereoSample::silence()));
        assert!(out[64..74].iter().all(|s| *s == StereoSample::mono(1.0)));
        assert!(out[74..].iter().all(|s| *s == StereoSample::silence()));
    }

    #[test]
    fn test_click_at_zero_and_disabled() {
        let collector = Collector::new();
        let mut metronome = Metronome::new(AssetIndex(0), 120.0, 48000, Some(Box::new(MemoryPlayer::new())));
        metronome.load(constant_asset(&collector.handle(), 4));

        metronome.process(0, 128);
        assert_eq!(metronome.output().len(), 128);
        assert!(metronome.output().iter().all(|s| *s == StereoSample::silence()));

        metronome.set_enabled(true);
        metronome.process(0, 128);
        assert_eq!(metronome.output()[0], StereoSample::mono(1.0));
        assert_eq!(metronome.output()[4], StereoSample::silence());
    }

    #[test]
    fn test_beat_on_window_boundary_fires_once() {
        let collector = Collector::new();
        // 173 bpm at 48kHz: beat 173 lands exactly on frame 2_880_000
        let mut metronome = Metronome::new(AssetIndex(0), 173.0, 48000, Some(Box::new(MemoryPlayer::new())));
        metronome.load(constant_asset(&collector.handle(), 4));
        metronome.set_enabled(true);

        metronome.process(2_879_872, 128);
        assert!(metronome.output().iter().all(|s| *s == StereoSample::silence()));

        metronome.process(2_880_000, 128);
        assert_eq!(metronome.output()[0], StereoSample::mono(1.0));
        assert_eq!(metronome.output()[4], StereoSample::silence());
    }

    #[test]
    fn test_every_beat_triggers_across_tempos() {
        for bpm in [119.5, 133.0, 149.0, 173.0, 177.7] {
            let beat_frames = 60.0 / bpm * 48000.0;
            let mut next = 0u64;
            let mut cursor = 0u64;
            while cursor < 48000 * 120 {
                let window_end = cursor + 128;
                let mut beat = first_beat_at_or_after(cursor, beat_frames);
                while beat_frame(beat, beat_frames) < window_end {
                    assert_eq!(beat, next, "bpm {} window {}", bpm, cursor);
                    next += 1;
                    beat += 1;
                }
                cursor = window_end;
            }
            assert!(next > 200, "bpm {}", bpm);
        }
    }
}
