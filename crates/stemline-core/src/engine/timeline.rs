//! Real-time timeline scheduler
//!
//! The [`Timeline`] lives on the audio thread and owns all playback state.
//! Each callback it:
//! 1. Applies queued commands in FIFO order
//! 2. Installs asset deliveries for the current generation
//! 3. While playing, renders every track, mixes them through the cascade and
//!    advances the frame cursor by the quantum size
//!
//! Nothing here allocates, blocks or logs. Replaced timelines and buffers are
//! released through `basedrop`, log lines go through the diagnostic ring.

use basedrop::{Owned, Shared};

use super::command::{Envelope, TimelineCommand};
use super::diagnostics::{Diagnostic, DiagnosticSender, LifecycleState};
use super::event::{EventSender, TimelineEvent};
use super::prepare::{AssetState, PreparedTimeline};
use super::track::Track;
use crate::asset::{AssetBuffer, AssetDelivery, AssetTarget, DeliveryPayload};
use crate::capability::{EffectKind, EffectParam};
use crate::error::CommandError;
use crate::types::{
    seconds_to_frames, Generation, RegionIndex, StereoSample, TrackIndex, MAX_BUFFER_SIZE,
};

pub struct Timeline {
    state: LifecycleState,
    generation: Generation,
    cursor: u64,
    timeline: Option<Owned<PreparedTimeline>>,
    /// Enter Playing as soon as the pending load becomes ready
    resume_when_ready: bool,
    cursor_event_interval: u32,
    buffers_since_cursor_event: u32,
    commands: rtrb::Consumer<Envelope>,
    deliveries: rtrb::Consumer<AssetDelivery>,
    events: EventSender,
    /// Drop count last passed on as a diagnostic
    reported_drops: u64,
    diagnostics: DiagnosticSender,
}

impl Timeline {
    pub fn new(
        commands: rtrb::Consumer<Envelope>,
        deliveries: rtrb::Consumer<AssetDelivery>,
        events: EventSender,
        diagnostics: DiagnosticSender,
        cursor_event_interval: u32,
    ) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            generation: Generation::default(),
            cursor: 0,
            timeline: None,
            resume_when_ready: false,
            cursor_event_interval: cursor_event_interval.max(1),
            buffers_since_cursor_event: 0,
            commands,
            deliveries,
            events,
            reported_drops: 0,
            diagnostics,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn prepared(&self) -> Option<&PreparedTimeline> {
        self.timeline.as_deref()
    }

    /// Audio callback entry point
    ///
    /// Fills `output` completely. Quanta longer than [`MAX_BUFFER_SIZE`] are
    /// rendered in chunks.
    pub fn process(&mut self, output: &mut [StereoSample]) {
        self.process_commands();
        self.process_deliveries();

        if output.len() > MAX_BUFFER_SIZE {
            self.diagnostics.record(Diagnostic::OversizedBuffer { frames: output.len() });
        }
        for chunk in output.chunks_mut(MAX_BUFFER_SIZE) {
            self.render(chunk);
        }

        let dropped = self.events.dropped();
        if dropped > self.reported_drops {
            self.diagnostics.record(Diagnostic::EventsDropped { total: dropped });
            self.reported_drops = dropped;
        }
    }

    fn process_commands(&mut self) {
        while let Ok(envelope) = self.commands.pop() {
            self.apply(envelope);
        }
    }

    fn apply(&mut self, envelope: Envelope) {
        let Envelope { seq, command } = envelope;
        let name = command.name();

        if self.state == LifecycleState::Terminated && !matches!(command, TimelineCommand::LoadTimeline(_)) {
            self.diagnostics.record(Diagnostic::IgnoredAfterReset { command: name });
            return;
        }

        let result = match command {
            TimelineCommand::LoadTimeline(prepared) => {
                self.load(prepared);
                Ok(())
            }
            TimelineCommand::UpdateTimeline(prepared) => {
                self.update(prepared);
                Ok(())
            }
            TimelineCommand::Play => self.play(),
            TimelineCommand::Pause => {
                self.pause();
                Ok(())
            }
            TimelineCommand::Stop => {
                self.stop();
                Ok(())
            }
            TimelineCommand::Seek(seconds) => self.seek(seconds),
            TimelineCommand::SetTrackVolume { track, volume } => {
                if !volume.is_finite() {
                    Err(CommandError::InvalidValue)
                } else {
                    self.track_mut(track).map(|t| t.set_volume(volume))
                }
            }
            TimelineCommand::SetTrackMute { track, muted } => {
                self.track_mut(track).map(|t| t.set_muted(muted))
            }
            TimelineCommand::SetTrackSolo { track, soloed } => {
                self.track_mut(track).map(|t| t.set_soloed(soloed))
            }
            TimelineCommand::SetBusEffect { track, effect, enabled } => {
                self.set_bus_effect(track, effect, enabled)
            }
            TimelineCommand::SetBusEffectParam { track, effect, param, value } => {
                self.set_bus_effect_param(track, effect, param, value)
            }
            TimelineCommand::SetMetronome(enabled) => self.set_metronome(enabled),
            TimelineCommand::RequestRegionBuffer { track, region } => {
                self.request_region_buffer(track, region)
            }
            TimelineCommand::Reset => {
                self.reset();
                Ok(())
            }
        };

        if let Err(error) = result {
            self.events.send(TimelineEvent::CommandRejected { seq, error });
            self.diagnostics.record(Diagnostic::CommandRejected { seq, command: name, error });
        }
    }

    fn set_state(&mut self, to: LifecycleState) {
        if self.state != to {
            self.diagnostics.record(Diagnostic::StateChanged { from: self.state, to });
            self.state = to;
        }
    }

    fn load(&mut self, prepared: Owned<PreparedTimeline>) {
        self.generation = prepared.generation;
        // Old timeline goes to the collector
        drop(self.timeline.replace(prepared));
        self.cursor = 0;
        self.resume_when_ready = false;
        self.buffers_since_cursor_event = 0;
        self.set_state(LifecycleState::Loading);
        self.check_assets_settled();
    }

    fn update(&mut self, prepared: Owned<PreparedTimeline>) {
        let was_playing = self.state == LifecycleState::Playing
            || (self.state == LifecycleState::Loading && self.resume_when_ready);
        self.generation = prepared.generation;
        self.cursor = self.cursor.min(prepared.duration_frames);
        drop(self.timeline.replace(prepared));
        self.resume_when_ready = was_playing;
        self.set_state(LifecycleState::Loading);
        self.check_assets_settled();
    }

    fn play(&mut self) -> Result<(), CommandError> {
        match self.state {
            LifecycleState::Ready | LifecycleState::Paused => {
                self.set_state(LifecycleState::Playing);
                Ok(())
            }
            LifecycleState::Playing => Ok(()),
            _ => Err(CommandError::NotReady),
        }
    }

    fn pause(&mut self) {
        match self.state {
            LifecycleState::Playing => self.set_state(LifecycleState::Paused),
            LifecycleState::Loading => self.resume_when_ready = false,
            _ => {}
        }
    }

    fn stop(&mut self) {
        if self.timeline.is_none() {
            return;
        }
        self.cursor = 0;
        self.resume_when_ready = false;
        self.relocate();
        if self.state.is_loaded() {
            self.set_state(LifecycleState::Paused);
        }
        self.events.send(TimelineEvent::CursorMoved { frame: 0 });
    }

    fn seek(&mut self, seconds: f64) -> Result<(), CommandError> {
        if !seconds.is_finite() {
            return Err(CommandError::InvalidValue);
        }
        let (sample_rate, duration) = match self.timeline.as_deref() {
            Some(t) => (t.sample_rate, t.duration_frames),
            None => return Err(CommandError::NotReady),
        };
        self.cursor = seconds_to_frames(seconds, sample_rate).min(duration);
        self.buffers_since_cursor_event = 0;
        self.relocate();
        self.events.send(TimelineEvent::CursorMoved { frame: self.cursor });
        Ok(())
    }

    /// Re-sync every region and the metronome with the cursor
    fn relocate(&mut self) {
        let cursor = self.cursor;
        if let Some(timeline) = self.timeline.as_deref_mut() {
            for track in &mut timeline.tracks {
                track.relocate_all(cursor);
            }
            if let Some(metronome) = timeline.metronome.as_mut() {
                metronome.relocate();
            }
        }
    }

    fn reset(&mut self) {
        drop(self.timeline.take());
        self.cursor = 0;
        self.resume_when_ready = false;
        self.set_state(LifecycleState::Terminated);
        self.events.send(TimelineEvent::TimelineReset);
    }

    fn track_mut(&mut self, track: TrackIndex) -> Result<&mut Track, CommandError> {
        let timeline = self.timeline.as_deref_mut().ok_or(CommandError::NotReady)?;
        let len = timeline.tracks.len();
        timeline
            .tracks
            .get_mut(track.0)
            .ok_or(CommandError::IndexOutOfRange { index: track.0, len })
    }

    fn set_bus_effect(&mut self, track: TrackIndex, kind: EffectKind, enabled: bool) -> Result<(), CommandError> {
        let effect = self.track_mut(track)?.effect_mut(kind).ok_or(CommandError::EffectUnavailable)?;
        if enabled && !effect.is_enabled() {
            effect.reset();
        }
        effect.set_enabled(enabled);
        Ok(())
    }

    fn set_bus_effect_param(
        &mut self,
        track: TrackIndex,
        kind: EffectKind,
        param: EffectParam,
        value: f32,
    ) -> Result<(), CommandError> {
        if !value.is_finite() {
            return Err(CommandError::InvalidValue);
        }
        let effect = self.track_mut(track)?.effect_mut(kind).ok_or(CommandError::EffectUnavailable)?;
        match param {
            EffectParam::Mix => {
                effect.set_mix(value);
                Ok(())
            }
            _ if effect.set_param(param, value) => Ok(()),
            _ => Err(CommandError::InvalidValue),
        }
    }

    fn set_metronome(&mut self, enabled: bool) -> Result<(), CommandError> {
        let timeline = self.timeline.as_deref_mut().ok_or(CommandError::NotReady)?;
        let metronome = timeline.metronome.as_mut().ok_or(CommandError::MetronomeUnavailable)?;
        metronome.set_enabled(enabled);
        Ok(())
    }

    fn request_region_buffer(&mut self, track: TrackIndex, region: RegionIndex) -> Result<(), CommandError> {
        let track_ref = self.track_mut(track)?;
        let len = track_ref.regions().len();
        let buffer = track_ref
            .regions()
            .get(region.0)
            .ok_or(CommandError::IndexOutOfRange { index: region.0, len })?
            .buffer()
            .map(Shared::clone)
            .ok_or(CommandError::BufferNotLoaded)?;
        self.events.send(TimelineEvent::RegionBufferData { track, region, buffer });
        Ok(())
    }

    fn process_deliveries(&mut self) {
        while let Ok(delivery) = self.deliveries.pop() {
            self.deliver(delivery);
        }
    }

    fn deliver(&mut self, delivery: AssetDelivery) {
        let AssetDelivery { generation, asset, payload } = delivery;
        let current = self.generation;
        let timeline = match self.timeline.as_deref_mut() {
            Some(t) if generation == current => t,
            _ => {
                self.diagnostics.record(Diagnostic::StaleDelivery { delivered: generation, current });
                return;
            }
        };
        let Some(slot) = timeline.assets.get_mut(asset.0) else {
            return;
        };
        if slot.state != AssetState::Pending {
            return;
        }

        match payload {
            DeliveryPayload::Buffer { target, buffer } => {
                install(timeline, target, buffer);
                let slot = &mut timeline.assets[asset.0];
                slot.pending = slot.pending.saturating_sub(1);
                if slot.pending == 0 {
                    slot.state = AssetState::Loaded;
                }
            }
            DeliveryPayload::Failed(kind) => {
                slot.state = AssetState::Failed;
                self.events.send(TimelineEvent::AssetFailed { generation, asset, kind });
            }
        }
        self.check_assets_settled();
    }

    /// Loading -> Ready once every asset is loaded or failed
    fn check_assets_settled(&mut self) {
        if self.state != LifecycleState::Loading {
            return;
        }
        let settled = self.timeline.as_deref().map(|t| t.all_assets_settled()).unwrap_or(false);
        if !settled {
            return;
        }

        let generation = self.generation;
        self.events.send(TimelineEvent::AssetsDownloaded { generation });
        self.relocate();
        self.set_state(LifecycleState::Ready);
        self.events.send(TimelineEvent::Ready { generation });
        if self.resume_when_ready {
            self.resume_when_ready = false;
            self.set_state(LifecycleState::Playing);
        }
    }

    fn render(&mut self, out: &mut [StereoSample]) {
        let timeline = match self.timeline.as_deref_mut() {
            Some(t) if self.state == LifecycleState::Playing => t,
            _ => {
                out.fill(StereoSample::silence());
                return;
            }
        };

        let cursor = self.cursor;
        let frames = out.len();
        let PreparedTimeline {
            tracks,
            cascade,
            metronome,
            duration_frames,
            ..
        } = timeline;

        let any_soloed = tracks.iter().any(Track::is_soloed);
        for track in tracks.iter_mut() {
            track.process(cursor, frames, any_soloed);
        }
        if let Some(metronome) = metronome.as_mut() {
            metronome.process(cursor, frames);
        }

        let tracks: &[Track] = tracks.as_slice();
        let metronome = metronome.as_ref();
        cascade.process(
            move |i| match tracks.get(i) {
                Some(track) => Some(track.output()),
                None => metronome.map(|m| m.output()),
            },
            out,
        );

        let duration = *duration_frames;
        self.cursor = (cursor + frames as u64).min(duration);
        if self.cursor >= duration {
            self.finish();
            return;
        }

        self.buffers_since_cursor_event += 1;
        if self.buffers_since_cursor_event >= self.cursor_event_interval {
            self.buffers_since_cursor_event = 0;
            self.events.send(TimelineEvent::CursorMoved { frame: self.cursor });
        }
    }

    /// Cursor reached the end: stop every region once and pause
    fn finish(&mut self) {
        if let Some(timeline) = self.timeline.as_deref_mut() {
            for track in &mut timeline.tracks {
                track.deactivate_all();
            }
            if let Some(metronome) = timeline.metronome.as_mut() {
                metronome.relocate();
            }
        }
        self.buffers_since_cursor_event = 0;
        self.set_state(LifecycleState::Paused);
        self.events.send(TimelineEvent::CursorMoved { frame: self.cursor });
        self.events.send(TimelineEvent::PlaybackEnded { frame: self.cursor });
    }
}

fn install(timeline: &mut PreparedTimeline, target: AssetTarget, buffer: Shared<AssetBuffer>) {
    match target {
        AssetTarget::Region(track, region) => {
            if let Some(region) = timeline
                .tracks
                .get_mut(track.0)
                .and_then(|t| t.regions_mut().get_mut(region.0))
            {
                region.load(buffer);
            }
        }
        AssetTarget::Metronome => {
            if let Some(metronome) = timeline.metronome.as_mut() {
                metronome.load(buffer);
            }
        }
    }
}
