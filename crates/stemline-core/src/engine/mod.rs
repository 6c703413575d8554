//! Real-time scheduling engine

pub mod cascade;
pub mod command;
pub mod diagnostics;
pub mod event;
pub mod gc;
pub mod metronome;
pub mod prepare;
pub mod region;
pub mod timeline;
pub mod track;

pub use cascade::MixingCascade;
pub use command::{command_channel, CommandSender, Envelope, TimelineCommand, COMMAND_QUEUE_CAPACITY};
pub use diagnostics::{log_diagnostic, Diagnostic, LifecycleState, DIAGNOSTIC_QUEUE_CAPACITY};
pub use event::{TimelineEvent, EVENT_QUEUE_CAPACITY};
pub use gc::Reclaimer;
pub use metronome::Metronome;
pub use prepare::{prepare, AssetSlot, AssetState, Preparation, PreparedTimeline, TimelineLayout};
pub use region::Region;
pub use timeline::Timeline;
pub use track::Track;

use crate::asset::{delivery_channel, AssetDelivery};
use crate::config::EngineConfig;
use diagnostics::{diagnostic_channel, DiagnosticSender};
use event::{event_channel, EventSender};

/// Control-thread ends of the rings connected to a [`Timeline`]
pub struct ControlPorts {
    pub commands: CommandSender,
    pub events: rtrb::Consumer<TimelineEvent>,
    pub diagnostics: rtrb::Consumer<Diagnostic>,
    pub deliveries: rtrb::Producer<AssetDelivery>,
}

/// Create a [`Timeline`] and the control ports wired to it
///
/// Ring capacities come from `config`.
pub fn timeline_channels(config: &EngineConfig) -> (Timeline, ControlPorts) {
    let (command_tx, command_rx) = command_channel(config.command_queue_capacity);
    let (event_tx, event_rx) = event_channel(config.event_queue_capacity);
    let (diag_tx, diag_rx) = diagnostic_channel(config.diagnostic_queue_capacity);
    let (delivery_tx, delivery_rx) = delivery_channel(config.asset_queue_capacity);

    let timeline = Timeline::new(
        command_rx,
        delivery_rx,
        EventSender::new(event_tx),
        DiagnosticSender::new(diag_tx),
        config.cursor_event_interval,
    );
    let ports = ControlPorts {
        commands: CommandSender::new(command_tx),
        events: event_rx,
        diagnostics: diag_rx,
        deliveries: delivery_tx,
    };
    (timeline, ports)
}
