//! Control-side counterpart of the [`Timeline`]
//!
//! The [`TimelineController`] is the only thing the host talks to. It:
//! - Parses wire messages and maps descriptor ids to track/region indices
//! - Prepares timelines off the audio thread and hands them over as
//!   `basedrop::Owned`
//! - Queues asset loads for each new generation
//! - Drains events and diagnostics, translating events back to wire form
//!
//! [`Timeline`]: crate::engine::Timeline

use std::sync::Arc;

use basedrop::{Handle, Owned};

use crate::capability::CapabilityProvider;
use crate::config::EngineConfig;
use crate::engine::{
    log_diagnostic, prepare, CommandSender, ControlPorts, Diagnostic, TimelineCommand, TimelineEvent,
    TimelineLayout,
};
use crate::error::{CapabilityAllocationError, CommandError, ControlError};
use crate::loader::{AssetLoader, AssetSource};
use crate::protocol::{
    ControlMessage, EventMessage, ItemId, TimelineDescriptor, TrackControl, TrackControlMessage,
    TransportAction, TransportMessage,
};
use crate::types::{Generation, RegionIndex, TrackIndex};

/// Outcome of preparing and queueing a timeline
#[derive(Debug)]
pub struct LoadReport {
    pub generation: Generation,
    /// Unique asset URLs queued for loading
    pub assets: usize,
    /// Slots that will render silence
    pub allocation_failures: Vec<CapabilityAllocationError>,
}

pub struct TimelineController {
    config: EngineConfig,
    provider: Arc<dyn CapabilityProvider>,
    handle: Handle,
    commands: CommandSender,
    events: rtrb::Consumer<TimelineEvent>,
    diagnostics: rtrb::Consumer<Diagnostic>,
    loader: AssetLoader,
    generation: Generation,
    layout: Option<TimelineLayout>,
    terminated: bool,
}

impl TimelineController {
    /// Wire a controller to the ports of a [`Timeline`](crate::engine::Timeline)
    ///
    /// Spawns the asset loader on the delivery port.
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn CapabilityProvider>,
        source: Arc<dyn AssetSource>,
        handle: Handle,
        ports: ControlPorts,
    ) -> std::io::Result<Self> {
        let ControlPorts {
            commands,
            events,
            diagnostics,
            deliveries,
        } = ports;
        let loader = AssetLoader::new(
            source,
            deliveries,
            handle.clone(),
            config.sample_rate,
            config.asset_timeout(),
        )?;

        Ok(Self {
            config,
            provider,
            handle,
            commands,
            events,
            diagnostics,
            loader,
            generation: Generation::default(),
            layout: None,
            terminated: false,
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn layout(&self) -> Option<&TimelineLayout> {
        self.layout.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Parse and apply one JSON control message
    pub fn handle_json(&mut self, text: &str) -> Result<(), ControlError> {
        let message = ControlMessage::from_json(text)?;
        self.handle_message(message)
    }

    pub fn handle_message(&mut self, message: ControlMessage) -> Result<(), ControlError> {
        if self.terminated && !matches!(message, ControlMessage::InitialTimelineData(_)) {
            log::debug!("ignoring message after reset");
            return Ok(());
        }

        match message {
            ControlMessage::InitialTimelineData(descriptor) => {
                self.load_timeline(&descriptor)?;
            }
            ControlMessage::TimelineUpdate(update) => {
                self.update_timeline(&update.timeline_data)?;
            }
            ControlMessage::Command(transport) => self.transport(transport)?,
            ControlMessage::TrackControl(control) => self.track_control(&control)?,
            ControlMessage::Metronome(metronome) => {
                if self.layout.is_some() {
                    self.send(TimelineCommand::SetMetronome(metronome.enabled))?;
                }
            }
            ControlMessage::RequestRegionBuffer(request) => {
                let Some(layout) = self.layout.as_ref() else {
                    return Ok(());
                };
                let track = resolve_track(layout, &request.track_id)?;
                let region = layout
                    .region_index(track, &request.region_id)
                    .ok_or_else(|| ControlError::command(CommandError::UnknownRegion, request.region_id.to_string()))?;
                self.send(TimelineCommand::RequestRegionBuffer { track, region })?;
            }
            ControlMessage::Reset => self.reset()?,
        }
        Ok(())
    }

    /// Replace whatever is loaded with `descriptor`, cursor at 0
    pub fn load_timeline(&mut self, descriptor: &TimelineDescriptor) -> Result<LoadReport, ControlError> {
        self.install(descriptor, false)
    }

    /// Swap in a new descriptor keeping the cursor and transport state
    ///
    /// Without a loaded timeline this is a plain load.
    pub fn update_timeline(&mut self, descriptor: &TimelineDescriptor) -> Result<LoadReport, ControlError> {
        let update = self.layout.is_some();
        self.install(descriptor, update)
    }

    fn install(&mut self, descriptor: &TimelineDescriptor, update: bool) -> Result<LoadReport, ControlError> {
        let generation = self.generation.next();
        let prep = prepare(descriptor, generation, self.config.sample_rate, self.provider.as_ref())?;

        for failure in &prep.failures {
            log::warn!("{}", failure);
        }

        let timeline = Owned::new(&self.handle, prep.timeline);
        let command = if update {
            TimelineCommand::UpdateTimeline(timeline)
        } else {
            TimelineCommand::LoadTimeline(timeline)
        };
        self.send(command)?;

        log::info!(
            "{} timeline generation {}: {} tracks, {} assets",
            if update { "updated" } else { "loaded" },
            generation.0,
            prep.layout.track_ids.len(),
            prep.requests.len()
        );

        let assets = prep.requests.len();
        self.generation = generation;
        self.layout = Some(prep.layout);
        self.terminated = false;
        self.loader.request(generation, prep.requests);

        Ok(LoadReport {
            generation,
            assets,
            allocation_failures: prep.failures,
        })
    }

    fn transport(&mut self, transport: TransportMessage) -> Result<(), ControlError> {
        if self.layout.is_none() {
            log::debug!("transport {:?} before any timeline", transport.command);
            return Ok(());
        }
        let command = match transport.command {
            TransportAction::Play => TimelineCommand::Play,
            TransportAction::Pause => TimelineCommand::Pause,
            TransportAction::Stop => TimelineCommand::Stop,
            TransportAction::UpdateCursor => {
                let seconds = transport
                    .cursor_sec
                    .ok_or_else(|| ControlError::command(CommandError::InvalidValue, "cursorSec"))?;
                TimelineCommand::Seek(seconds)
            }
        };
        self.send(command)?;
        Ok(())
    }

    fn track_control(&mut self, message: &TrackControlMessage) -> Result<(), ControlError> {
        let control = message.parse()?;
        let Some(layout) = self.layout.as_ref() else {
            return Ok(());
        };
        let track = resolve_track(layout, &message.track_id)?;

        let command = match control {
            TrackControl::Volume(volume) => TimelineCommand::SetTrackVolume { track, volume },
            TrackControl::Mute(muted) => TimelineCommand::SetTrackMute { track, muted },
            TrackControl::Solo(soloed) => TimelineCommand::SetTrackSolo { track, soloed },
            TrackControl::EffectEnabled(effect, enabled) => TimelineCommand::SetBusEffect { track, effect, enabled },
            TrackControl::EffectParam(effect, param, value) => TimelineCommand::SetBusEffectParam {
                track,
                effect,
                param,
                value,
            },
        };
        self.send(command)?;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ControlError> {
        self.send(TimelineCommand::Reset)?;
        self.layout = None;
        self.terminated = true;
        Ok(())
    }

    fn send(&mut self, command: TimelineCommand) -> Result<u64, ControlError> {
        let name = command.name();
        let seq = self.commands.send(command)?;
        log::debug!("queued #{} {}", seq, name);
        Ok(seq)
    }

    /// Forward pending diagnostics to the log
    pub fn drain_diagnostics(&mut self) {
        while let Ok(diagnostic) = self.diagnostics.pop() {
            log_diagnostic(&diagnostic);
        }
    }

    /// Drain diagnostics and translate pending events to wire form
    pub fn poll_events(&mut self) -> Vec<EventMessage> {
        self.drain_diagnostics();

        let mut messages = Vec::new();
        while let Ok(event) = self.events.pop() {
            if let Some(message) = self.translate(event) {
                messages.push(message);
            }
        }
        messages
    }

    fn translate(&self, event: TimelineEvent) -> Option<EventMessage> {
        let message = match event {
            TimelineEvent::Ready { generation } => {
                self.is_current(generation)?;
                EventMessage::Ready
            }
            TimelineEvent::AssetsDownloaded { generation } => {
                self.is_current(generation)?;
                EventMessage::AssetsDownloaded
            }
            TimelineEvent::CursorMoved { frame } => EventMessage::TimelineFrameCursor {
                timeline_frame_cursor: frame,
            },
            TimelineEvent::TimelineReset => EventMessage::TimelineReset,
            TimelineEvent::PlaybackEnded { frame } => EventMessage::TimelineEnded {
                timeline_frame_cursor: frame,
            },
            TimelineEvent::AssetFailed { generation, asset, kind } => {
                self.is_current(generation)?;
                let url = self.layout.as_ref()?.asset_url(asset)?.to_string();
                EventMessage::AssetError {
                    url,
                    reason: kind.to_string(),
                }
            }
            TimelineEvent::RegionBufferData { track, region, buffer } => {
                let (track_id, region_id) = self.region_ids(track, region)?;
                EventMessage::RegionBufferData {
                    track_id,
                    region_id,
                    sample_rate: buffer.sample_rate,
                    buffer: buffer.samples.as_interleaved().to_vec(),
                }
            }
            TimelineEvent::CommandRejected { seq, error } => EventMessage::CommandRejected {
                seq,
                reason: error.to_string(),
            },
        };
        Some(message)
    }

    fn is_current(&self, generation: Generation) -> Option<()> {
        (generation == self.generation).then_some(())
    }

    fn region_ids(&self, track: TrackIndex, region: RegionIndex) -> Option<(ItemId, ItemId)> {
        let layout = self.layout.as_ref()?;
        Some((layout.track_id(track)?.clone(), layout.region_id(track, region)?.clone()))
    }
}

fn resolve_track(layout: &TimelineLayout, id: &ItemId) -> Result<TrackIndex, ControlError> {
    layout
        .track_index(id)
        .ok_or_else(|| ControlError::command(CommandError::UnknownTrack, id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        AudioPlayerCapability, EffectCapability, EffectKind, MixerCapability, NativeProvider,
    };
    use crate::engine::{timeline_channels, Timeline};
    use crate::error::{CapabilityKind, ProtocolError};
    use crate::loader::MemorySource;
    use crate::types::StereoSample;
    use basedrop::Collector;
    use std::time::{Duration, Instant};

    const TIMELINE_JSON: &str = r#"{
        "type": "initialTimelineData",
        "data": {
            "duration": 1.0,
            "tracks": [
                {"id": "drums", "actions": [{"id": 1, "start": 0.0, "end": 0.5, "url": "drums.wav", "data": {"name": "Drums", "color": "red"}}]},
                {"id": "bass", "actions": [{"id": "b1", "start": 0.25, "end": 1.0, "url": "missing.wav", "data": {}}]}
            ]
        }
    }"#;

    struct Rig {
        _collector: Collector,
        timeline: Timeline,
        controller: TimelineController,
        out: Vec<StereoSample>,
    }

    impl Rig {
        fn new() -> Self {
            Self::with_provider(Arc::new(NativeProvider))
        }

        fn with_provider(provider: Arc<dyn CapabilityProvider>) -> Self {
            let collector = Collector::new();
            let source = MemorySource::new();
            source.insert("drums.wav", crate::loader::wav_bytes(24000, 2, 48000, 0.5));
            let config = EngineConfig::default();
            let (timeline, ports) = timeline_channels(&config);
            let controller = TimelineController::new(
                config,
                provider,
                Arc::new(source),
                collector.handle(),
                ports,
            )
            .unwrap();
            Self {
                _collector: collector,
                timeline,
                controller,
                out: vec![StereoSample::silence(); 128],
            }
        }

        /// Run callbacks until `done` sees the events it wants
        fn run_until(&mut self, mut done: impl FnMut(&[EventMessage]) -> bool) -> Vec<EventMessage> {
            let deadline = Instant::now() + Duration::from_secs(5);
            let mut seen = Vec::new();
            while Instant::now() < deadline {
                self.timeline.process(&mut self.out);
                seen.extend(self.controller.poll_events());
                if done(&seen) {
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            seen
        }

        fn run_for(&mut self, callbacks: usize) -> Vec<EventMessage> {
            let mut seen = Vec::new();
            for _ in 0..callbacks {
                self.timeline.process(&mut self.out);
                seen.extend(self.controller.poll_events());
            }
            seen
        }
    }

    #[test]
    fn test_load_reports_ready_and_asset_errors() {
        let mut rig = Rig::new();
        rig.controller.handle_json(TIMELINE_JSON).unwrap();
        assert_eq!(rig.controller.generation(), Generation(1));

        let events = rig.run_until(|e| e.contains(&EventMessage::Ready));
        assert!(events.contains(&EventMessage::AssetsDownloaded));
        assert!(events.contains(&EventMessage::Ready));
        assert!(events.iter().any(|e| matches!(
            e,
            EventMessage::AssetError { url, .. } if url == "missing.wav"
        )));
    }

    #[test]
    fn test_unknown_track_rejected_synchronously() {
        let mut rig = Rig::new();
        rig.controller.handle_json(TIMELINE_JSON).unwrap();

        let err = rig
            .controller
            .handle_json(r#"{"type":"trackControl","data":{"trackId":"keys","control":"mute","value":true}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Command { error: CommandError::UnknownTrack, ref id } if id == "keys"
        ));

        let err = rig
            .controller
            .handle_json(r#"{"type":"trackControl","data":{"trackId":"drums","control":"chorus","value":true}}"#)
            .unwrap_err();
        assert!(matches!(err, ControlError::Protocol(ProtocolError::UnknownControl(_))));
    }

    #[test]
    fn test_play_before_ready_is_acknowledged() {
        let mut rig = Rig::new();
        rig.controller.handle_json(TIMELINE_JSON).unwrap();
        rig.controller.handle_json(r#"{"type":"command","data":{"command":"play"}}"#).unwrap();

        // Commands are applied before deliveries, so play always meets Loading
        let events = rig.run_for(1);
        assert!(events.iter().any(|e| matches!(e, EventMessage::CommandRejected { seq: 2, .. })));
    }

    #[test]
    fn test_region_buffer_round_trip() {
        let mut rig = Rig::new();
        rig.controller.handle_json(TIMELINE_JSON).unwrap();
        rig.run_until(|e| e.contains(&EventMessage::Ready));

        rig.controller
            .handle_json(r#"{"type":"requestRegionBuffer","data":{"trackId":"drums","regionId":1}}"#)
            .unwrap();
        let events = rig.run_until(|e| e.iter().any(|m| matches!(m, EventMessage::RegionBufferData { .. })));
        let data = events
            .iter()
            .find_map(|m| match m {
                EventMessage::RegionBufferData {
                    track_id,
                    region_id,
                    sample_rate,
                    buffer,
                } => Some((track_id.clone(), region_id.clone(), *sample_rate, buffer.len())),
                _ => None,
            })
            .unwrap();
        assert_eq!(data, (ItemId::from("drums"), ItemId::from("1"), 48000, 48000));
    }

    #[test]
    fn test_missing_region_buffer_rejected() {
        let mut rig = Rig::new();
        rig.controller.handle_json(TIMELINE_JSON).unwrap();
        rig.run_until(|e| e.contains(&EventMessage::Ready));

        rig.controller
            .handle_json(r#"{"type":"requestRegionBuffer","data":{"trackId":"bass","regionId":"b1"}}"#)
            .unwrap();
        let events = rig.run_until(|e| e.iter().any(|m| matches!(m, EventMessage::CommandRejected { .. })));
        assert!(events.iter().any(|m| matches!(
            m,
            EventMessage::CommandRejected { reason, .. } if reason == "region buffer not loaded"
        )));
    }

    #[test]
    fn test_reset_then_messages_are_noops() {
        let mut rig = Rig::new();
        rig.controller.handle_json(TIMELINE_JSON).unwrap();
        rig.controller.handle_json(r#"{"type":"reset"}"#).unwrap();
        assert!(rig.controller.is_terminated());

        rig.controller
            .handle_json(r#"{"type":"trackControl","data":{"trackId":"keys","control":"mute","value":true}}"#)
            .unwrap();
        rig.controller.handle_json(r#"{"type":"reset"}"#).unwrap();

        let events = rig.run_for(20);
        let resets = events.iter().filter(|e| **e == EventMessage::TimelineReset).count();
        assert_eq!(resets, 1);
        assert!(!events.contains(&EventMessage::Ready));

        rig.controller.handle_json(TIMELINE_JSON).unwrap();
        assert!(!rig.controller.is_terminated());
        assert_eq!(rig.controller.generation(), Generation(2));
    }

    /// Native provider without a reverb
    struct DryProvider;

    impl CapabilityProvider for DryProvider {
        fn create_player(
            &self,
            sample_rate: u32,
        ) -> Result<Box<dyn AudioPlayerCapability>, CapabilityAllocationError> {
            NativeProvider.create_player(sample_rate)
        }

        fn create_effect(
            &self,
            kind: EffectKind,
            sample_rate: u32,
        ) -> Result<Box<dyn EffectCapability>, CapabilityAllocationError> {
            match kind {
                EffectKind::Reverb => Err(CapabilityAllocationError::new(CapabilityKind::Effect, "no reverb")),
                EffectKind::Flanger => NativeProvider.create_effect(kind, sample_rate),
            }
        }

        fn create_mixer(&self) -> Result<Box<dyn MixerCapability>, CapabilityAllocationError> {
            NativeProvider.create_mixer()
        }
    }

    #[test]
    fn test_load_report_names_failed_slots() {
        let mut rig = Rig::with_provider(Arc::new(DryProvider));
        let descriptor = match serde_json::from_str::<ControlMessage>(TIMELINE_JSON).unwrap() {
            ControlMessage::InitialTimelineData(descriptor) => descriptor,
            other => panic!("unexpected message {:?}", other),
        };

        let report = rig.controller.load_timeline(&descriptor).unwrap();
        let slots: Vec<_> = report.allocation_failures.iter().map(|f| f.slot.as_str()).collect();
        assert_eq!(slots, vec!["track drums reverb", "track bass reverb"]);
        assert_eq!(report.assets, 2);

        // The drums region still plays through the dry track
        let events = rig.run_until(|e| e.contains(&EventMessage::Ready));
        assert!(events.contains(&EventMessage::Ready));
        rig.controller
            .handle_json(r#"{"type":"command","data":{"command":"play"}}"#)
            .unwrap();
        rig.run_for(4);
        assert!(rig.out.iter().any(|s| s.left.abs() > 0.1));
    }
}
