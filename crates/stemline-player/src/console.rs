//! Line-oriented control input
//!
//! A line starting with `{` is a raw JSON control message. Anything else is a
//! shorthand command:
//!
//! ```text
//! play | pause | stop | reset
//! seek <seconds>
//! metronome on|off
//! <control> <track-id> <value>     e.g. `volume drums 0.5`, `mute bass on`
//! buffer <track-id> <region-id>
//! quit
//! ```

use serde_json::Value;
use stemline_core::protocol::{
    ControlMessage, ItemId, MetronomeMessage, RegionBufferRequest, TrackControlMessage,
    TransportAction, TransportMessage,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Message(ControlMessage),
    Json(String),
    Quit,
    Empty,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number: {0}")]
    Number(String),
}

pub fn parse_line(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if line.starts_with('{') {
        return Ok(Input::Json(line.to_string()));
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    let input = match words.as_slice() {
        ["quit"] | ["exit"] => Input::Quit,
        ["play"] => transport(TransportAction::Play, None),
        ["pause"] => transport(TransportAction::Pause, None),
        ["stop"] => transport(TransportAction::Stop, None),
        ["reset"] => Input::Message(ControlMessage::Reset),
        ["seek", seconds] => transport(TransportAction::UpdateCursor, Some(number(seconds)?)),
        ["seek", ..] => return Err(InputError::Usage("seek <seconds>")),
        ["metronome", state] => Input::Message(ControlMessage::Metronome(MetronomeMessage {
            enabled: switch(state)?,
        })),
        ["buffer", track, region] => {
            Input::Message(ControlMessage::RequestRegionBuffer(RegionBufferRequest {
                track_id: ItemId::from(*track),
                region_id: ItemId::from(*region),
            }))
        }
        [control, track, value] => Input::Message(ControlMessage::TrackControl(TrackControlMessage {
            track_id: ItemId::from(*track),
            control: control.to_string(),
            value: control_value(value)?,
        })),
        [other, ..] => return Err(InputError::Unknown(other.to_string())),
        [] => Input::Empty,
    };
    Ok(input)
}

fn transport(command: TransportAction, cursor_sec: Option<f64>) -> Input {
    Input::Message(ControlMessage::Command(TransportMessage { command, cursor_sec }))
}

fn number(word: &str) -> Result<f64, InputError> {
    word.parse().map_err(|_| InputError::Number(word.to_string()))
}

fn switch(word: &str) -> Result<bool, InputError> {
    match word {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(InputError::Usage("on|off")),
    }
}

fn control_value(word: &str) -> Result<Value, InputError> {
    if let Ok(flag) = switch(word) {
        if !word.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Value::Bool(flag));
        }
    }
    Ok(Value::from(number(word)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_shorthand() {
        assert_eq!(
            parse_line("seek 1.5").unwrap(),
            Input::Message(ControlMessage::Command(TransportMessage {
                command: TransportAction::UpdateCursor,
                cursor_sec: Some(1.5),
            }))
        );
        assert_eq!(parse_line("  ").unwrap(), Input::Empty);
        assert_eq!(parse_line("quit").unwrap(), Input::Quit);
    }

    #[test]
    fn test_track_control_shorthand() {
        let Input::Message(ControlMessage::TrackControl(msg)) = parse_line("mute bass on").unwrap() else {
            panic!("expected track control");
        };
        assert_eq!(msg.track_id, ItemId::from("bass"));
        assert_eq!(msg.value, Value::Bool(true));

        let Input::Message(ControlMessage::TrackControl(msg)) = parse_line("volume drums 0.5").unwrap() else {
            panic!("expected track control");
        };
        assert_eq!(msg.value.as_f64(), Some(0.5));
    }

    #[test]
    fn test_json_passthrough() {
        let line = r#"{"type":"reset"}"#;
        assert_eq!(parse_line(line).unwrap(), Input::Json(line.to_string()));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_line("seek").unwrap_err(), InputError::Usage("seek <seconds>"));
        assert_eq!(parse_line("seek soon").unwrap_err(), InputError::Number("soon".to_string()));
        assert!(matches!(parse_line("dance"), Err(InputError::Unknown(_))));
    }
}
