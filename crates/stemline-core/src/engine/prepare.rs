//! Turning a descriptor into a ready-to-swap timeline
//!
//! Runs on the control thread. Every allocation the audio thread will ever
//! need for this timeline happens here: capability instances, track and
//! mixer buffers, asset bookkeeping.

use std::collections::HashMap;

use crate::asset::{AssetIndex, AssetRequest, AssetTarget};
use crate::capability::{CapabilityProvider, EffectKind};
use crate::engine::cascade::MixingCascade;
use crate::engine::metronome::Metronome;
use crate::engine::region::Region;
use crate::engine::track::Track;
use crate::error::{CapabilityAllocationError, ProtocolError};
use crate::protocol::{ItemId, TimelineDescriptor};
use crate::types::{seconds_to_frames, Generation, RegionIndex, TrackIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    Loaded,
    Failed,
}

/// Delivery bookkeeping for one unique asset URL
#[derive(Debug, Clone)]
pub struct AssetSlot {
    /// Targets still waiting for their copy
    pub pending: usize,
    pub state: AssetState,
}

/// Everything the audio thread owns for one loaded timeline
pub struct PreparedTimeline {
    pub(crate) generation: Generation,
    pub(crate) sample_rate: u32,
    pub(crate) duration_frames: u64,
    pub(crate) tracks: Vec<Track>,
    pub(crate) cascade: MixingCascade,
    pub(crate) metronome: Option<Metronome>,
    pub(crate) assets: Vec<AssetSlot>,
}

impl PreparedTimeline {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_frames(&self) -> u64 {
        self.duration_frames
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn metronome(&self) -> Option<&Metronome> {
        self.metronome.as_ref()
    }

    pub fn assets(&self) -> &[AssetSlot] {
        &self.assets
    }

    pub fn all_assets_settled(&self) -> bool {
        self.assets.iter().all(|a| a.state != AssetState::Pending)
    }
}

/// Id lookup kept by the controller for one timeline
#[derive(Debug, Clone, Default)]
pub struct TimelineLayout {
    pub generation: Generation,
    pub track_ids: Vec<ItemId>,
    pub region_ids: Vec<Vec<ItemId>>,
    pub asset_urls: Vec<String>,
    track_lookup: HashMap<ItemId, TrackIndex>,
}

impl TimelineLayout {
    pub fn track_index(&self, id: &ItemId) -> Option<TrackIndex> {
        self.track_lookup.get(id).copied()
    }

    pub fn region_index(&self, track: TrackIndex, id: &ItemId) -> Option<RegionIndex> {
        self.region_ids
            .get(track.0)?
            .iter()
            .position(|r| r == id)
            .map(RegionIndex)
    }

    pub fn track_id(&self, track: TrackIndex) -> Option<&ItemId> {
        self.track_ids.get(track.0)
    }

    pub fn region_id(&self, track: TrackIndex, region: RegionIndex) -> Option<&ItemId> {
        self.region_ids.get(track.0)?.get(region.0)
    }

    pub fn asset_url(&self, asset: AssetIndex) -> Option<&str> {
        self.asset_urls.get(asset.0).map(String::as_str)
    }
}

/// Result of [`prepare`]
pub struct Preparation {
    pub timeline: PreparedTimeline,
    pub layout: TimelineLayout,
    pub requests: Vec<AssetRequest>,
    /// Slots that degrade to silence
    pub failures: Vec<CapabilityAllocationError>,
}

/// Validate `descriptor` and allocate its timeline
///
/// A non-positive duration falls back to the end of the last region.
pub fn prepare(
    descriptor: &TimelineDescriptor,
    generation: Generation,
    sample_rate: u32,
    provider: &dyn CapabilityProvider,
) -> Result<Preparation, ProtocolError> {
    if !descriptor.duration.is_finite() || descriptor.duration < 0.0 {
        return Err(ProtocolError::InvalidDuration(descriptor.duration));
    }

    let mut failures = Vec::new();
    let mut requests: Vec<AssetRequest> = Vec::new();
    let mut by_url: HashMap<String, AssetIndex> = HashMap::new();
    let mut asset_for = |url: &str, target: AssetTarget, requests: &mut Vec<AssetRequest>| {
        let index = *by_url.entry(url.to_string()).or_insert_with(|| {
            let index = AssetIndex(requests.len());
            requests.push(AssetRequest {
                asset: index,
                url: url.to_string(),
                targets: Vec::new(),
            });
            index
        });
        requests[index.0].targets.push(target);
        index
    };

    let mut layout = TimelineLayout {
        generation,
        ..Default::default()
    };
    let mut tracks = Vec::with_capacity(descriptor.tracks.len());
    let mut last_end = 0u64;

    for (t, track_desc) in descriptor.tracks.iter().enumerate() {
        let track_index = TrackIndex(t);
        if layout.track_lookup.insert(track_desc.id.clone(), track_index).is_some() {
            return Err(ProtocolError::DuplicateTrack(track_desc.id.to_string()));
        }

        let mut regions = Vec::with_capacity(track_desc.actions.len());
        let mut region_ids = Vec::with_capacity(track_desc.actions.len());
        for (r, action) in track_desc.actions.iter().enumerate() {
            let start_frame = seconds_to_frames(action.start, sample_rate);
            let end_frame = seconds_to_frames(action.end, sample_rate);
            if !action.start.is_finite() || !action.end.is_finite() || start_frame >= end_frame {
                return Err(ProtocolError::InvalidRegionRange {
                    track: track_desc.id.to_string(),
                    region: action.id.to_string(),
                    start: action.start,
                    end: action.end,
                });
            }

            let asset = asset_for(
                &action.url,
                AssetTarget::Region(track_index, RegionIndex(r)),
                &mut requests,
            );
            let player = match provider.create_player(sample_rate) {
                Ok(player) => Some(player),
                Err(e) => {
                    failures.push(e.for_slot(format!("track {} region {}", track_desc.id, action.id)));
                    None
                }
            };
            last_end = last_end.max(end_frame);
            regions.push(Region::new(action.id.to_string(), start_frame, end_frame, asset, player));
            region_ids.push(action.id.clone());
        }

        let mut effect = |kind: EffectKind| match provider.create_effect(kind, sample_rate) {
            Ok(effect) => Some(effect),
            Err(e) => {
                failures.push(e.for_slot(format!("track {} {}", track_desc.id, kind.name())));
                None
            }
        };
        let flanger = effect(EffectKind::Flanger);
        let reverb = effect(EffectKind::Reverb);

        tracks.push(Track::new(track_desc.id.to_string(), regions, flanger, reverb));
        layout.track_ids.push(track_desc.id.clone());
        layout.region_ids.push(region_ids);
    }

    let metronome = match &descriptor.metronome {
        Some(desc) => {
            if !desc.bpm.is_finite() || desc.bpm <= 0.0 {
                return Err(ProtocolError::InvalidTempo(desc.bpm));
            }
            let asset = asset_for(&desc.blip_url, AssetTarget::Metronome, &mut requests);
            let player = match provider.create_player(sample_rate) {
                Ok(player) => Some(player),
                Err(e) => {
                    failures.push(e.for_slot("metronome"));
                    None
                }
            };
            Some(Metronome::new(asset, desc.bpm, sample_rate, player))
        }
        None => None,
    };

    let inputs = tracks.len() + usize::from(metronome.is_some());
    let (cascade, mixer_failures) = MixingCascade::build(inputs, provider);
    failures.extend(mixer_failures);

    let duration_frames = match seconds_to_frames(descriptor.duration, sample_rate) {
        0 => last_end,
        frames => frames,
    };

    let assets = requests
        .iter()
        .map(|req| AssetSlot {
            pending: req.targets.len(),
            state: AssetState::Pending,
        })
        .collect();
    layout.asset_urls = requests.iter().map(|r| r.url.clone()).collect();

    Ok(Preparation {
        timeline: PreparedTimeline {
            generation,
            sample_rate,
            duration_frames,
            tracks,
            cascade,
            metronome,
            assets,
        },
        layout,
        requests,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;

    use crate::capability::{AudioPlayerCapability, EffectCapability, MixerCapability, NativeProvider};
    use crate::engine::region::tests::constant_asset;
    use crate::error::CapabilityKind;
    use crate::protocol::{MetronomeDescriptor, RegionDescriptor, RegionMetadata, TrackDescriptor};
    use crate::types::StereoSample;

    fn region(id: &str, start: f64, end: f64, url: &str) -> RegionDescriptor {
        RegionDescriptor {
            id: ItemId::from(id),
            start,
            end,
            url: url.to_string(),
            data: RegionMetadata::default(),
        }
    }

    fn descriptor() -> TimelineDescriptor {
        TimelineDescriptor {
            duration: 4.0,
            tracks: vec![
                TrackDescriptor {
                    id: ItemId::from("drums"),
                    actions: vec![region("d1", 0.0, 2.0, "loop.flac"), region("d2", 2.0, 4.0, "loop.flac")],
                },
                TrackDescriptor {
                    id: ItemId::from("bass"),
                    actions: vec![region("b1", 0.5, 3.0, "bass.flac")],
                },
            ],
            metronome: None,
        }
    }

    #[test]
    fn test_prepare_dedups_asset_urls() {
        let prep = prepare(&descriptor(), Generation(1), 48000, &NativeProvider).unwrap();
        assert_eq!(prep.requests.len(), 2);
        assert_eq!(prep.requests[0].url, "loop.flac");
        assert_eq!(prep.requests[0].targets.len(), 2);
        assert_eq!(prep.timeline.assets()[0].pending, 2);
        assert_eq!(prep.timeline.duration_frames(), 192000);
        assert!(prep.failures.is_empty());
    }

    #[test]
    fn test_prepare_frame_conversion() {
        let prep = prepare(&descriptor(), Generation(1), 48000, &NativeProvider).unwrap();
        let bass = &prep.timeline.tracks()[1].regions()[0];
        assert_eq!(bass.start_frame(), 24000);
        assert_eq!(bass.end_frame(), 144000);
    }

    #[test]
    fn test_layout_lookup() {
        let prep = prepare(&descriptor(), Generation(3), 48000, &NativeProvider).unwrap();
        let bass = prep.layout.track_index(&ItemId::from("bass")).unwrap();
        assert_eq!(bass, TrackIndex(1));
        assert_eq!(prep.layout.region_index(bass, &ItemId::from("b1")), Some(RegionIndex(0)));
        assert_eq!(prep.layout.track_index(&ItemId::from("keys")), None);
        assert_eq!(prep.layout.asset_url(AssetIndex(1)), Some("bass.flac"));
    }

    #[test]
    fn test_prepare_rejects_inverted_region() {
        let mut desc = descriptor();
        desc.tracks[1].actions[0].end = 0.25;
        assert!(matches!(
            prepare(&desc, Generation(1), 48000, &NativeProvider),
            Err(ProtocolError::InvalidRegionRange { .. })
        ));
    }

    #[test]
    fn test_prepare_rejects_duplicate_tracks() {
        let mut desc = descriptor();
        desc.tracks[1].id = ItemId::from("drums");
        assert!(matches!(
            prepare(&desc, Generation(1), 48000, &NativeProvider),
            Err(ProtocolError::DuplicateTrack(_))
        ));
    }

    #[test]
    fn test_metronome_adds_cascade_input() {
        let mut desc = descriptor();
        desc.metronome = Some(MetronomeDescriptor {
            blip_url: "blip.wav".to_string(),
            bpm: 100.0,
        });
        let prep = prepare(&desc, Generation(1), 48000, &NativeProvider).unwrap();
        assert_eq!(prep.requests.len(), 3);
        assert_eq!(prep.requests[2].targets, vec![AssetTarget::Metronome]);
        assert_eq!(prep.timeline.cascade.input_count(), 3);
    }

    #[test]
    fn test_zero_duration_uses_last_region_end() {
        let mut desc = descriptor();
        desc.duration = 0.0;
        let prep = prepare(&desc, Generation(1), 48000, &NativeProvider).unwrap();
        assert_eq!(prep.timeline.duration_frames(), 192000);
    }

    /// Provider that can refuse players, reverbs, or both
    struct Refusing {
        players: bool,
        reverb: bool,
    }

    impl CapabilityProvider for Refusing {
        fn create_player(
            &self,
            sample_rate: u32,
        ) -> Result<Box<dyn AudioPlayerCapability>, CapabilityAllocationError> {
            if self.players {
                return Err(CapabilityAllocationError::new(CapabilityKind::Player, "no voices left"));
            }
            NativeProvider.create_player(sample_rate)
        }

        fn create_effect(
            &self,
            kind: EffectKind,
            sample_rate: u32,
        ) -> Result<Box<dyn EffectCapability>, CapabilityAllocationError> {
            if self.reverb && kind == EffectKind::Reverb {
                return Err(CapabilityAllocationError::new(CapabilityKind::Effect, "no reverb"));
            }
            NativeProvider.create_effect(kind, sample_rate)
        }

        fn create_mixer(&self) -> Result<Box<dyn MixerCapability>, CapabilityAllocationError> {
            NativeProvider.create_mixer()
        }
    }

    #[test]
    fn test_missing_reverb_is_reported_and_track_still_renders() {
        let collector = Collector::new();
        let provider = Refusing { players: false, reverb: true };
        let mut prep = prepare(&descriptor(), Generation(1), 48000, &provider).unwrap();

        let slots: Vec<_> = prep.failures.iter().map(|f| f.slot.as_str()).collect();
        assert_eq!(slots, vec!["track drums reverb", "track bass reverb"]);
        assert!(prep.failures.iter().all(|f| f.capability == CapabilityKind::Effect));

        let drums = &mut prep.timeline.tracks[0];
        assert!(drums.effect(EffectKind::Reverb).is_none());
        assert!(drums.effect(EffectKind::Flanger).is_some());

        drums.regions_mut()[0].load(constant_asset(&collector.handle(), 96000));
        drums.process(0, 128, false);
        assert_eq!(drums.output().len(), 128);
        assert!(drums.output().iter().all(|s| *s == StereoSample::mono(1.0)));
    }

    #[test]
    fn test_missing_players_are_reported_per_region() {
        let collector = Collector::new();
        let mut desc = descriptor();
        desc.metronome = Some(MetronomeDescriptor {
            blip_url: "blip.wav".to_string(),
            bpm: 120.0,
        });
        let provider = Refusing { players: true, reverb: false };
        let mut prep = prepare(&desc, Generation(1), 48000, &provider).unwrap();

        let slots: Vec<_> = prep.failures.iter().map(|f| f.slot.as_str()).collect();
        assert_eq!(
            slots,
            vec!["track drums region d1", "track drums region d2", "track bass region b1", "metronome"]
        );
        assert!(prep.failures.iter().all(|f| f.capability == CapabilityKind::Player));

        // The layout and regions survive; the silent region still tracks the cursor
        assert_eq!(prep.timeline.tracks().len(), 2);
        assert_eq!(prep.requests.len(), 3);
        let drums = &mut prep.timeline.tracks[0];
        drums.regions_mut()[0].load(constant_asset(&collector.handle(), 96000));
        drums.process(0, 128, false);
        assert!(drums.regions()[0].is_playing());
        assert!(drums.output().iter().all(|s| *s == StereoSample::silence()));
    }
}
