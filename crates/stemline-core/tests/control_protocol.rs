//! JSON control sessions against a callback-driven timeline

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stemline_core::capability::NativeProvider;
use stemline_core::loader::MemorySource;
use stemline_core::protocol::EventMessage;
use stemline_core::{timeline_channels, EngineConfig, Generation, Reclaimer, StereoSample, Timeline, TimelineController};

const SESSION: &str = r#"{
    "type": "initialTimelineData",
    "data": {
        "duration": 2.0,
        "tracks": [
            {"id": "lead", "actions": [{"id": "l1", "start": 0.0, "end": 1.0, "url": "lead.wav", "data": {"name": "Lead"}}]},
            {"id": "pad", "actions": [{"id": "p1", "start": 0.5, "end": 2.0, "url": "pad.wav"}]}
        ]
    }
}"#;

const UPDATED_SESSION: &str = r#"{
    "type": "timelineUpdate",
    "data": {
        "timelineData": {
            "duration": 2.0,
            "tracks": [
                {"id": "lead", "actions": [
                    {"id": "l1", "start": 0.0, "end": 1.0, "url": "lead.wav"},
                    {"id": "l2", "start": 1.0, "end": 2.0, "url": "lead.wav"}
                ]}
            ]
        }
    }
}"#;

fn wav(frames: usize, sample_rate: u32, value: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let sample = (value * i16::MAX as f32) as i16;
        for _ in 0..frames * 2 {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

struct Session {
    timeline: Timeline,
    controller: TimelineController,
    out: Vec<StereoSample>,
    _reclaimer: Reclaimer,
}

impl Session {
    fn new() -> Self {
        let reclaimer = Reclaimer::start().unwrap();
        let source = MemorySource::new();
        source.insert("lead.wav", wav(44100, 44100, 0.25));
        source.insert("pad.wav", wav(72000, 48000, 0.5));

        let config = EngineConfig::default();
        let (timeline, ports) = timeline_channels(&config);
        let controller = TimelineController::new(
            config,
            Arc::new(NativeProvider),
            Arc::new(source),
            reclaimer.handle(),
            ports,
        )
        .unwrap();

        Self {
            timeline,
            controller,
            out: vec![StereoSample::silence(); 128],
            _reclaimer: reclaimer,
        }
    }

    fn send(&mut self, json: &str) {
        self.controller.handle_json(json).unwrap();
    }

    fn run_until(&mut self, mut done: impl FnMut(&EventMessage) -> bool) -> Vec<EventMessage> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            self.timeline.process(&mut self.out);
            let events = self.controller.poll_events();
            let finished = events.iter().any(&mut done);
            seen.extend(events);
            if finished {
                return seen;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("timed out; saw {:?}", seen);
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

fn cursors(events: &[EventMessage]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            EventMessage::TimelineFrameCursor { timeline_frame_cursor } => Some(*timeline_frame_cursor),
            _ => None,
        })
        .collect()
}

#[test]
fn test_session_from_load_to_end() {
    let mut session = Session::new();
    session.send(SESSION);
    let events = session.run_until(|e| *e == EventMessage::Ready);
    assert!(events.contains(&EventMessage::AssetsDownloaded));
    assert!(!events.iter().any(|e| matches!(e, EventMessage::AssetError { .. })));

    session.send(r#"{"type":"trackControl","data":{"trackId":"pad","control":"volume","value":0.5}}"#);
    session.send(r#"{"type":"command","data":{"command":"play"}}"#);
    let events = session.run_for(40);
    assert_eq!(cursors(&events), vec![1024, 2048, 3072, 4096, 5120]);

    session.send(r#"{"type":"command","data":{"command":"updateCursor","cursorSec":1.5}}"#);
    let events = session.run_for(1);
    assert_eq!(cursors(&events), vec![72000]);
    // Only the pad plays past 1 s, at half volume
    assert!((session.out[0].left - 0.25).abs() < 1e-3);

    // Load=1, volume=2, play=3, seek=4, metronome=5
    session.send(r#"{"type":"metronome","data":{"enabled":true}}"#);
    let events = session.run_for(1);
    assert!(events.contains(&EventMessage::CommandRejected {
        seq: 5,
        reason: "metronome unavailable".to_string(),
    }));

    let events = session.run_until(|e| matches!(e, EventMessage::TimelineEnded { .. }));
    let ended = events.iter().find(|e| matches!(e, EventMessage::TimelineEnded { .. })).unwrap();
    assert_eq!(
        serde_json::to_value(ended).unwrap(),
        serde_json::json!({"event": "timeline-ended", "data": {"timelineFrameCursor": 96000}})
    );
}

#[test]
fn test_update_while_playing_keeps_cursor() {
    let mut session = Session::new();
    session.send(SESSION);
    session.run_until(|e| *e == EventMessage::Ready);
    session.send(r#"{"type":"command","data":{"command":"play"}}"#);
    session.run_for(10);

    session.send(UPDATED_SESSION);
    assert_eq!(session.controller.generation(), Generation(2));
    session.run_until(|e| *e == EventMessage::Ready);

    let events = session.run_for(8);
    let positions = cursors(&events);
    assert!(!positions.is_empty());
    assert!(positions.iter().all(|&frame| frame > 1280), "{:?}", positions);

    // The lead now has two regions; the second one exists and is addressable
    session.send(r#"{"type":"requestRegionBuffer","data":{"trackId":"lead","regionId":"l2"}}"#);
    let events = session.run_until(|e| matches!(e, EventMessage::RegionBufferData { .. }));
    let Some(EventMessage::RegionBufferData { region_id, sample_rate, buffer, .. }) =
        events.into_iter().find(|e| matches!(e, EventMessage::RegionBufferData { .. }))
    else {
        unreachable!();
    };
    assert_eq!(region_id.to_string(), "l2");
    assert_eq!(sample_rate, 48000);
    // 1 s at 44.1 kHz resampled to 48 kHz, interleaved stereo
    assert_eq!(buffer.len(), 2 * 48000);
}

#[test]
fn test_reset_ends_the_session() {
    let mut session = Session::new();
    session.send(SESSION);
    session.run_until(|e| *e == EventMessage::Ready);

    session.send(r#"{"type":"reset"}"#);
    session.send(r#"{"type":"command","data":{"command":"play"}}"#);
    let events = session.run_for(4);
    assert_eq!(events, vec![EventMessage::TimelineReset]);
    assert!(session.controller.is_terminated());
    assert!(session.out.iter().all(|s| *s == StereoSample::silence()));
}
