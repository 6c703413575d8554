//! Control messages in, event messages out

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::descriptor::{ItemId, TimelineDescriptor};
use crate::capability::{EffectKind, EffectParam};
use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ControlMessage {
    InitialTimelineData(TimelineDescriptor),
    Command(TransportMessage),
    TrackControl(TrackControlMessage),
    TimelineUpdate(TimelineUpdateMessage),
    Metronome(MetronomeMessage),
    RequestRegionBuffer(RegionBufferRequest),
    Reset,
}

impl ControlMessage {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportAction {
    Play,
    Pause,
    Stop,
    UpdateCursor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportMessage {
    pub command: TransportAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackControlMessage {
    pub track_id: ItemId,
    pub control: String,
    pub value: Value,
}

/// A parsed track control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackControl {
    Volume(f32),
    Mute(bool),
    Solo(bool),
    EffectEnabled(EffectKind, bool),
    EffectParam(EffectKind, EffectParam, f32),
}

impl TrackControlMessage {
    pub fn parse(&self) -> Result<TrackControl, ProtocolError> {
        use EffectKind::{Flanger, Reverb};

        let control = match self.control.as_str() {
            "volume" => TrackControl::Volume(self.number()?),
            "mute" => TrackControl::Mute(self.flag()?),
            "solo" => TrackControl::Solo(self.flag()?),
            "reverb" => TrackControl::EffectEnabled(Reverb, self.flag()?),
            "flanger" => TrackControl::EffectEnabled(Flanger, self.flag()?),
            "reverbMix" => TrackControl::EffectParam(Reverb, EffectParam::Mix, self.number()?),
            "reverbRoomSize" => TrackControl::EffectParam(Reverb, EffectParam::RoomSize, self.number()?),
            "reverbDamping" => TrackControl::EffectParam(Reverb, EffectParam::Damping, self.number()?),
            "reverbWidth" => TrackControl::EffectParam(Reverb, EffectParam::Width, self.number()?),
            "flangerWet" => TrackControl::EffectParam(Flanger, EffectParam::Mix, self.number()?),
            "flangerDepth" => TrackControl::EffectParam(Flanger, EffectParam::Depth, self.number()?),
            "flangerRate" => TrackControl::EffectParam(Flanger, EffectParam::Rate, self.number()?),
            "flangerFeedback" => TrackControl::EffectParam(Flanger, EffectParam::Feedback, self.number()?),
            other => return Err(ProtocolError::UnknownControl(other.to_string())),
        };
        Ok(control)
    }

    fn number(&self) -> Result<f32, ProtocolError> {
        self.value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| self.value_error("number"))
    }

    /// Booleans, with 0/1 accepted as well
    fn flag(&self) -> Result<bool, ProtocolError> {
        match &self.value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => n.as_f64().map(|v| v != 0.0).ok_or_else(|| self.value_error("boolean")),
            _ => Err(self.value_error("boolean")),
        }
    }

    fn value_error(&self, expected: &'static str) -> ProtocolError {
        ProtocolError::ControlValue {
            control: self.control.clone(),
            expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineUpdateMessage {
    pub timeline_data: TimelineDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetronomeMessage {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionBufferRequest {
    pub track_id: ItemId,
    pub region_id: ItemId,
}

/// Messages posted back to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum EventMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "timelineFrameCursor", rename_all = "camelCase")]
    TimelineFrameCursor { timeline_frame_cursor: u64 },
    #[serde(rename = "assets-downloaded")]
    AssetsDownloaded,
    #[serde(rename = "timeline-reset")]
    TimelineReset,
    #[serde(rename = "region-buffer-data", rename_all = "camelCase")]
    RegionBufferData {
        track_id: ItemId,
        region_id: ItemId,
        sample_rate: u32,
        /// Interleaved stereo samples
        buffer: Vec<f32>,
    },
    #[serde(rename = "timeline-ended", rename_all = "camelCase")]
    TimelineEnded { timeline_frame_cursor: u64 },
    #[serde(rename = "asset-error")]
    AssetError { url: String, reason: String },
    #[serde(rename = "command-rejected")]
    CommandRejected { seq: u64, reason: String },
}

impl EventMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
