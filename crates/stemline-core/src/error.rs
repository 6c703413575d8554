//! Error types shared across the engine
//!
//! The audio thread only ever produces [`CommandError`] values (they are
//! `Copy` and travel back through the event ring). Everything else is raised on
//! control threads.

use thiserror::Error;

use crate::asset::AssetFailureKind;

/// Why a command was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// A track id the controller has never seen
    #[error("unknown track id")]
    UnknownTrack,

    /// A region id not present on the addressed track
    #[error("unknown region id")]
    UnknownRegion,

    /// A track or region index outside the loaded timeline
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Non-finite or otherwise unusable value
    #[error("invalid value")]
    InvalidValue,

    /// Transport command issued before the timeline is ready
    #[error("timeline not ready")]
    NotReady,

    /// Region buffer requested before its asset arrived
    #[error("region buffer not loaded")]
    BufferNotLoaded,

    /// The addressed track has no such effect slot
    #[error("effect unavailable")]
    EffectUnavailable,

    /// The timeline has no metronome voice
    #[error("metronome unavailable")]
    MetronomeUnavailable,
}

/// Failure to obtain a DSP capability instance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to allocate {capability} for {slot}: {reason}")]
pub struct CapabilityAllocationError {
    pub capability: CapabilityKind,
    /// Which slot the instance was meant for, e.g. `track 2 reverb`
    pub slot: String,
    pub reason: String,
}

impl CapabilityAllocationError {
    pub fn new(capability: CapabilityKind, reason: impl Into<String>) -> Self {
        Self {
            capability,
            slot: String::new(),
            reason: reason.into(),
        }
    }

    /// Attach the slot the instance was requested for
    pub fn for_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Player,
    Effect,
    Mixer,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CapabilityKind::Player => "player",
            CapabilityKind::Effect => "effect",
            CapabilityKind::Mixer => "mixer",
        };
        f.write_str(text)
    }
}

/// Failure to fetch, decode or resample one asset
#[derive(Error, Debug)]
#[error("asset {url}: {kind}: {detail}")]
pub struct AssetLoadError {
    pub url: String,
    pub kind: AssetFailureKind,
    pub detail: String,
}

impl AssetLoadError {
    pub fn new(url: impl Into<String>, kind: AssetFailureKind, detail: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            detail: detail.into(),
        }
    }
}

/// Malformed wire message or timeline descriptor
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("region {region} on track {track}: start {start}s is not before end {end}s")]
    InvalidRegionRange {
        track: String,
        region: String,
        start: f64,
        end: f64,
    },

    #[error("invalid timeline duration: {0}")]
    InvalidDuration(f64),

    #[error("duplicate track id {0}")]
    DuplicateTrack(String),

    #[error("metronome tempo must be positive, got {0}")]
    InvalidTempo(f64),

    #[error("unknown control {0}")]
    UnknownControl(String),

    #[error("control {control} expects a {expected} value")]
    ControlValue {
        control: String,
        expected: &'static str,
    },
}

/// Command ring is full; the command could not be queued
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("command queue full")]
pub struct SendError;

/// Anything the timeline controller can refuse synchronously
#[derive(Error, Debug)]
pub enum ControlError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{error}: {id}")]
    Command { error: CommandError, id: String },

    #[error(transparent)]
    Send(#[from] SendError),
}

impl ControlError {
    pub fn command(error: CommandError, id: impl Into<String>) -> Self {
        ControlError::Command {
            error,
            id: id.into(),
        }
    }
}
