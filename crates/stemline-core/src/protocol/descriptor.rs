//! Timeline descriptor as posted by the host application

use serde::{Deserialize, Serialize};

/// Track or region id; the wire allows strings and numbers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct ItemId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<RawId> for ItemId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => ItemId(s),
            RawId::Integer(i) => ItemId(i.to_string()),
            RawId::Float(f) => ItemId(f.to_string()),
        }
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDescriptor {
    /// Total length in seconds
    pub duration: f64,
    #[serde(default)]
    pub tracks: Vec<TrackDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metronome: Option<MetronomeDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: ItemId,
    /// Regions on this track
    #[serde(default)]
    pub actions: Vec<RegionDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    pub id: ItemId,
    /// Start in seconds
    pub start: f64,
    /// End in seconds
    pub end: f64,
    pub url: String,
    #[serde(default)]
    pub data: RegionMetadata,
}

/// Display metadata, ignored by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetronomeDescriptor {
    pub blip_url: String,
    pub bpm: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_parses_mixed_ids() {
        let json = r#"{
            "duration": 4.0,
            "tracks": [
                {"id": 1, "actions": [
                    {"id": "a", "start": 0, "end": 4, "url": "drums.flac",
                     "data": {"name": "Drums", "color": "red"}}
                ]},
                {"id": "vox", "actions": [
                    {"id": 7, "start": 1.5, "end": 3, "url": "vox.flac"}
                ]}
            ]
        }"#;
        let descriptor: TimelineDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.tracks.len(), 2);
        assert_eq!(descriptor.tracks[0].id, ItemId::from("1"));
        assert_eq!(descriptor.tracks[1].actions[0].id, ItemId::from("7"));
        assert_eq!(descriptor.tracks[0].actions[0].data.name, "Drums");
        assert!(descriptor.metronome.is_none());
    }

    #[test]
    fn test_metronome_descriptor() {
        let json = r#"{"duration": 2, "metronome": {"blipUrl": "blip.wav", "bpm": 120}}"#;
        let descriptor: TimelineDescriptor = serde_json::from_str(json).unwrap();
        let metronome = descriptor.metronome.unwrap();
        assert_eq!(metronome.blip_url, "blip.wav");
        assert_eq!(metronome.bpm, 120.0);
    }
}
