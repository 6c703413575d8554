//! Lock-free command queue from the control thread to the audio thread
//!
//! Commands are pushed into an `rtrb` ring and drained by the [`Timeline`]
//! at the start of every callback, in FIFO order, before any audio of that
//! quantum is rendered. A command never takes effect in the middle of a
//! buffer.
//!
//! Large payloads (prepared timelines) travel as `basedrop::Owned` so that
//! replacing or dropping them on the audio thread only enqueues a pointer for
//! the collector.
//!
//! [`Timeline`]: super::Timeline

use basedrop::Owned;

use super::prepare::PreparedTimeline;
use crate::capability::{EffectKind, EffectParam};
use crate::error::SendError;
use crate::types::{RegionIndex, TrackIndex};

/// Default command ring capacity
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Commands processed by the audio thread
pub enum TimelineCommand {
    /// Replace everything with a freshly prepared timeline, cursor at 0
    LoadTimeline(Owned<PreparedTimeline>),
    /// Replace tracks and regions, keeping the cursor and resuming playback
    UpdateTimeline(Owned<PreparedTimeline>),
    Play,
    Pause,
    /// Pause and return the cursor to frame 0
    Stop,
    /// Move the cursor to a time in seconds
    Seek(f64),
    SetTrackVolume { track: TrackIndex, volume: f32 },
    SetTrackMute { track: TrackIndex, muted: bool },
    SetTrackSolo { track: TrackIndex, soloed: bool },
    SetBusEffect { track: TrackIndex, effect: EffectKind, enabled: bool },
    SetBusEffectParam { track: TrackIndex, effect: EffectKind, param: EffectParam, value: f32 },
    SetMetronome(bool),
    /// Ask for a shared handle to a region's decoded buffer
    RequestRegionBuffer { track: TrackIndex, region: RegionIndex },
    /// Tear the timeline down; only a new load revives it
    Reset,
}

impl TimelineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TimelineCommand::LoadTimeline(_) => "LoadTimeline",
            TimelineCommand::UpdateTimeline(_) => "UpdateTimeline",
            TimelineCommand::Play => "Play",
            TimelineCommand::Pause => "Pause",
            TimelineCommand::Stop => "Stop",
            TimelineCommand::Seek(_) => "Seek",
            TimelineCommand::SetTrackVolume { .. } => "SetTrackVolume",
            TimelineCommand::SetTrackMute { .. } => "SetTrackMute",
            TimelineCommand::SetTrackSolo { .. } => "SetTrackSolo",
            TimelineCommand::SetBusEffect { .. } => "SetBusEffect",
            TimelineCommand::SetBusEffectParam { .. } => "SetBusEffectParam",
            TimelineCommand::SetMetronome(_) => "SetMetronome",
            TimelineCommand::RequestRegionBuffer { .. } => "RequestRegionBuffer",
            TimelineCommand::Reset => "Reset",
        }
    }
}

/// A command plus the sequence number used to acknowledge it
pub struct Envelope {
    pub seq: u64,
    pub command: TimelineCommand,
}

/// Create a command channel (producer/consumer pair)
pub fn command_channel(capacity: usize) -> (rtrb::Producer<Envelope>, rtrb::Consumer<Envelope>) {
    rtrb::RingBuffer::new(capacity.max(1))
}

/// Control-side handle that stamps commands with sequence numbers
pub struct CommandSender {
    producer: rtrb::Producer<Envelope>,
    next_seq: u64,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<Envelope>) -> Self {
        Self { producer, next_seq: 1 }
    }

    /// Queue a command, returning its sequence number
    ///
    /// Never blocks. When the ring is full the command is dropped and
    /// [`SendError`] returned.
    pub fn send(&mut self, command: TimelineCommand) -> Result<u64, SendError> {
        let seq = self.next_seq;
        match self.producer.push(Envelope { seq, command }) {
            Ok(()) => {
                self.next_seq += 1;
                Ok(seq)
            }
            Err(rtrb::PushError::Full(envelope)) => {
                log::warn!("command queue full, dropping {}", envelope.command.name());
                Err(SendError)
            }
        }
    }

    /// Free slots in the ring
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}
