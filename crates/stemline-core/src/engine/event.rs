//! Events from the audio thread back to the control thread
//!
//! Everything here is cheap to move and never allocates on push. Ids are
//! carried as indices; the controller maps them back to descriptor ids.

use basedrop::Shared;

use crate::asset::{AssetBuffer, AssetFailureKind, AssetIndex};
use crate::error::CommandError;
use crate::types::{Generation, RegionIndex, TrackIndex};

/// Default event ring capacity
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

pub enum TimelineEvent {
    /// All assets settled; transport commands are accepted
    Ready { generation: Generation },
    /// Every asset of the current timeline was delivered or failed
    AssetsDownloaded { generation: Generation },
    /// Periodic cursor report in frames
    CursorMoved { frame: u64 },
    /// The timeline was torn down
    TimelineReset,
    /// The cursor reached the end of the timeline
    PlaybackEnded { frame: u64 },
    AssetFailed {
        generation: Generation,
        asset: AssetIndex,
        kind: AssetFailureKind,
    },
    /// Reply to [`TimelineCommand::RequestRegionBuffer`]
    ///
    /// [`TimelineCommand::RequestRegionBuffer`]: super::TimelineCommand::RequestRegionBuffer
    RegionBufferData {
        track: TrackIndex,
        region: RegionIndex,
        buffer: Shared<AssetBuffer>,
    },
    /// A command that could not be applied
    CommandRejected { seq: u64, error: CommandError },
}

/// Audio-side event producer
///
/// Pushes never block. When the ring is full the event is dropped and
/// counted; the timeline turns a growing count into a diagnostic.
pub struct EventSender {
    producer: rtrb::Producer<TimelineEvent>,
    dropped: u64,
}

impl EventSender {
    pub fn new(producer: rtrb::Producer<TimelineEvent>) -> Self {
        Self { producer, dropped: 0 }
    }

    #[inline]
    pub fn send(&mut self, event: TimelineEvent) {
        if self.producer.push(event).is_err() {
            self.dropped += 1;
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub fn event_channel(capacity: usize) -> (rtrb::Producer<TimelineEvent>, rtrb::Consumer<TimelineEvent>) {
    rtrb::RingBuffer::new(capacity.max(1))
}
