//! Decoded asset buffers and the addressing used to route them into a
//! prepared timeline

use basedrop::Shared;

use crate::types::{Generation, RegionIndex, StereoBuffer, TrackIndex};

/// Decoded, engine-rate stereo audio for one region
///
/// Wrapped in `basedrop::Shared` once it leaves the loader so the audio
/// thread never frees it.
#[derive(Debug, Clone)]
pub struct AssetBuffer {
    pub samples: StereoBuffer,
    pub sample_rate: u32,
}

impl AssetBuffer {
    pub fn new(samples: StereoBuffer, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.samples.len() as u64
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Index of a unique asset URL within one prepared timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetIndex(pub usize);

/// Where a decoded copy of an asset is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetTarget {
    Region(TrackIndex, RegionIndex),
    Metronome,
}

/// One unique URL and every slot that needs its own copy of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub asset: AssetIndex,
    pub url: String,
    pub targets: Vec<AssetTarget>,
}

/// Why an asset never arrived; `Copy` so it can cross the event ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFailureKind {
    Fetch,
    Decode,
    Timeout,
    Unsupported,
}

impl std::fmt::Display for AssetFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AssetFailureKind::Fetch => "fetch failed",
            AssetFailureKind::Decode => "decode failed",
            AssetFailureKind::Timeout => "timed out",
            AssetFailureKind::Unsupported => "unsupported format",
        };
        f.write_str(text)
    }
}

/// Loader output routed to the audio thread
pub struct AssetDelivery {
    pub generation: Generation,
    pub asset: AssetIndex,
    pub payload: DeliveryPayload,
}

pub enum DeliveryPayload {
    /// One copy for one target; an asset with N targets sends N of these
    Buffer {
        target: AssetTarget,
        buffer: Shared<AssetBuffer>,
    },
    Failed(AssetFailureKind),
}

/// Default delivery ring capacity
pub const ASSET_QUEUE_CAPACITY: usize = 256;

pub fn delivery_channel(capacity: usize) -> (rtrb::Producer<AssetDelivery>, rtrb::Consumer<AssetDelivery>) {
    rtrb::RingBuffer::new(capacity.max(1))
}
