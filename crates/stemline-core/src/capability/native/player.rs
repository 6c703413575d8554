//! In-memory asset player

use basedrop::Shared;

use crate::asset::AssetBuffer;
use crate::capability::AudioPlayerCapability;
use crate::types::StereoSample;

/// Plays a decoded [`AssetBuffer`] frame by frame
///
/// Stops by itself at the end of the asset.
#[derive(Default)]
pub struct MemoryPlayer {
    asset: Option<Shared<AssetBuffer>>,
    position: u64,
    playing: bool,
}

impl MemoryPlayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioPlayerCapability for MemoryPlayer {
    fn open_memory(&mut self, asset: Shared<AssetBuffer>) {
        // Replacing drops the old handle; basedrop defers the free
        self.asset = Some(asset);
        self.position = self.position.min(self.duration_frames());
    }

    fn is_open(&self) -> bool {
        self.asset.is_some()
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn seek(&mut self, fraction: f64) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.position = (fraction * self.duration_frames() as f64).floor() as u64;
    }

    fn set_position(&mut self, frame: u64) {
        self.position = frame;
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn duration_frames(&self) -> u64 {
        self.asset.as_ref().map(|a| a.frames()).unwrap_or(0)
    }

    fn process_stereo(&mut self, out: &mut [StereoSample], append: bool, gain: f32) -> bool {
        let source = match (&self.asset, self.playing) {
            (Some(asset), true) => asset.samples.as_slice(),
            _ => {
                if !append {
                    out.fill(StereoSample::silence());
                }
                return false;
            }
        };

        let start = (self.position as usize).min(source.len());
        let available = (source.len() - start).min(out.len());
        let src = &source[start..start + available];

        if append {
            for (dst, s) in out.iter_mut().zip(src) {
                *dst += *s * gain;
            }
        } else {
            for (dst, s) in out.iter_mut().zip(src) {
                *dst = *s * gain;
            }
            out[available..].fill(StereoSample::silence());
        }

        self.position += available as u64;
        if start + available >= source.len() {
            self.playing = false;
        }
        available > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoBuffer;
    use basedrop::Collector;

    fn ramp(collector: &Collector, len: usize) -> Shared<AssetBuffer> {
        let samples = (0..len).map(|i| StereoSample::mono(i as f32)).collect();
        Shared::new(
            &collector.handle(),
            AssetBuffer::new(StereoBuffer::from_vec(samples), 48000),
        )
    }

    #[test]
    fn test_player_silent_until_played() {
        let collector = Collector::new();
        let mut player = MemoryPlayer::new();
        player.open_memory(ramp(&collector, 16));

        let mut out = [StereoSample::mono(9.0); 4];
        assert!(!player.process_stereo(&mut out, false, 1.0));
        assert!(out.iter().all(|s| *s == StereoSample::silence()));
    }

    #[test]
    fn test_player_renders_from_position() {
        let collector = Collector::new();
        let mut player = MemoryPlayer::new();
        player.open_memory(ramp(&collector, 16));
        player.set_position(4);
        player.play();

        let mut out = [StereoSample::silence(); 4];
        assert!(player.process_stereo(&mut out, false, 0.5));
        assert_eq!(out[0], StereoSample::mono(2.0));
        assert_eq!(out[3], StereoSample::mono(3.5));
        assert_eq!(player.position(), 8);
    }

    #[test]
    fn test_player_stops_at_end() {
        let collector = Collector::new();
        let mut player = MemoryPlayer::new();
        player.open_memory(ramp(&collector, 6));
        player.set_position(4);
        player.play();

        let mut out = [StereoSample::mono(1.0); 4];
        player.process_stereo(&mut out, false, 1.0);
        assert_eq!(out[1], StereoSample::mono(5.0));
        assert_eq!(out[2], StereoSample::silence());
        assert!(!player.is_playing());
    }

    #[test]
    fn test_player_append_and_seek() {
        let collector = Collector::new();
        let mut player = MemoryPlayer::new();
        player.open_memory(ramp(&collector, 10));
        player.seek(0.5);
        assert_eq!(player.position(), 5);
        player.play();

        let mut out = [StereoSample::mono(1.0); 2];
        player.process_stereo(&mut out, true, 1.0);
        assert_eq!(out[0], StereoSample::mono(6.0));
        assert_eq!(out[1], StereoSample::mono(7.0));
    }
}
