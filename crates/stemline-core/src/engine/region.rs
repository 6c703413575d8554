//! A schedulable audio clip on a track
//!
//! A region is active exactly while the frame cursor lies in
//! `[start_frame, end_frame)`. Activation can fall inside a render quantum, in
//! which case the frames before the start stay silent.

use basedrop::Shared;

use crate::asset::{AssetBuffer, AssetIndex};
use crate::capability::AudioPlayerCapability;
use crate::types::StereoSample;

pub struct Region {
    id: String,
    start_frame: u64,
    end_frame: u64,
    asset: AssetIndex,
    playing: bool,
    /// Silent frames before playback begins in the current quantum
    start_frame_offset: usize,
    /// `None` when the provider could not allocate a player
    player: Option<Box<dyn AudioPlayerCapability>>,
    /// Handle kept for export requests
    buffer: Option<Shared<AssetBuffer>>,
    activations: u32,
    deactivations: u32,
}

impl Region {
    /// Caller guarantees `start_frame < end_frame`
    pub fn new(
        id: impl Into<String>,
        start_frame: u64,
        end_frame: u64,
        asset: AssetIndex,
        player: Option<Box<dyn AudioPlayerCapability>>,
    ) -> Self {
        debug_assert!(start_frame < end_frame);
        Self {
            id: id.into(),
            start_frame,
            end_frame,
            asset,
            playing: false,
            start_frame_offset: 0,
            player,
            buffer: None,
            activations: 0,
            deactivations: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn end_frame(&self) -> u64 {
        self.end_frame
    }

    pub fn asset(&self) -> AssetIndex {
        self.asset
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn start_frame_offset(&self) -> usize {
        self.start_frame_offset
    }

    pub fn buffer(&self) -> Option<&Shared<AssetBuffer>> {
        self.buffer.as_ref()
    }

    /// Current player position, `None` without a player
    pub fn player_position(&self) -> Option<u64> {
        self.player.as_ref().map(|p| p.position())
    }

    /// Number of not-playing to playing transitions so far
    pub fn activations(&self) -> u32 {
        self.activations
    }

    /// Number of playing to not-playing transitions so far
    pub fn deactivations(&self) -> u32 {
        self.deactivations
    }

    /// Install the decoded asset
    pub fn load(&mut self, buffer: Shared<AssetBuffer>) {
        if let Some(player) = self.player.as_mut() {
            player.open_memory(Shared::clone(&buffer));
        }
        self.buffer = Some(buffer);
    }

    /// Activate or deactivate for the quantum `[cursor, cursor + buffer_size)`
    pub fn schedule(&mut self, cursor: u64, buffer_size: usize) {
        let window_end = cursor + buffer_size as u64;
        if cursor == self.start_frame {
            self.activate(0);
        } else if cursor < self.start_frame && self.start_frame < window_end {
            self.activate((self.start_frame - cursor) as usize);
        } else if cursor >= self.end_frame && self.playing {
            self.deactivate();
        }
    }

    /// Render the quantum starting at `cursor` into `out`
    ///
    /// `out` is always fully overwritten. Frames before the start offset and
    /// after `end_frame` are silent.
    pub fn render(&mut self, out: &mut [StereoSample], cursor: u64) {
        out.fill(StereoSample::silence());
        if !self.playing {
            return;
        }

        let offset = self.start_frame_offset.min(out.len());
        self.start_frame_offset = 0;

        let first = cursor + offset as u64;
        let remaining = self.end_frame.saturating_sub(first);
        let len = (out.len() - offset).min(remaining.min(usize::MAX as u64) as usize);

        if let Some(player) = self.player.as_mut() {
            player.process_stereo(&mut out[offset..offset + len], false, 1.0);
        }
    }

    /// Mark the region not playing and pause its player
    pub fn deactivate(&mut self) {
        if self.playing {
            self.playing = false;
            self.deactivations += 1;
        }
        self.start_frame_offset = 0;
        if let Some(player) = self.player.as_mut() {
            player.pause();
        }
    }

    /// Jump to an arbitrary cursor (seek, stop, timeline update)
    ///
    /// Inside the region the player continues from `cursor - start_frame`. A
    /// cursor exactly on the start or before it is left to [`Region::schedule`]
    /// so the start is still hit sample-accurately.
    pub fn relocate(&mut self, cursor: u64) {
        if cursor > self.start_frame && cursor < self.end_frame {
            self.start_frame_offset = 0;
            if let Some(player) = self.player.as_mut() {
                player.set_position(cursor - self.start_frame);
                player.play();
            }
            if !self.playing {
                self.playing = true;
                self.activations += 1;
            }
        } else {
            self.deactivate();
        }
    }

    fn activate(&mut self, offset: usize) {
        self.start_frame_offset = offset;
        if let Some(player) = self.player.as_mut() {
            player.set_position(0);
            player.play();
        }
        if !self.playing {
            self.playing = true;
            self.activations += 1;
        }
    }
}
