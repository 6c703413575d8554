//! Deferred logging for the audio thread
//!
//! The audio callback must not log. It records small `Copy` values here and
//! the control thread forwards them to the `log` facade when it drains
//! events.

use crate::error::CommandError;
use crate::types::Generation;

pub const DIAGNOSTIC_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Diagnostic {
    StateChanged { from: LifecycleState, to: LifecycleState },
    CommandRejected { seq: u64, command: &'static str, error: CommandError },
    /// An asset delivery for a replaced timeline was discarded
    StaleDelivery { delivered: Generation, current: Generation },
    /// Commands ignored because the timeline was reset
    IgnoredAfterReset { command: &'static str },
    /// Callback asked for more frames than are pre-allocated
    OversizedBuffer { frames: usize },
    /// Events lost to a full event ring since the timeline was created
    EventsDropped { total: u64 },
}

/// Timeline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Playing,
    Paused,
    Terminated,
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Loading => "loading",
            LifecycleState::Ready => "ready",
            LifecycleState::Playing => "playing",
            LifecycleState::Paused => "paused",
            LifecycleState::Terminated => "terminated",
        }
    }

    /// Transport commands are accepted
    pub fn is_loaded(&self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Playing | LifecycleState::Paused)
    }
}

/// Audio-side diagnostic producer; full ring drops silently
pub struct DiagnosticSender {
    producer: rtrb::Producer<Diagnostic>,
}

impl DiagnosticSender {
    pub fn new(producer: rtrb::Producer<Diagnostic>) -> Self {
        Self { producer }
    }

    #[inline]
    pub fn record(&mut self, diagnostic: Diagnostic) {
        let _ = self.producer.push(diagnostic);
    }
}

pub fn diagnostic_channel(capacity: usize) -> (rtrb::Producer<Diagnostic>, rtrb::Consumer<Diagnostic>) {
    rtrb::RingBuffer::new(capacity.max(1))
}

/// Forward one diagnostic to `log` (control thread only)
pub fn log_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic {
        Diagnostic::StateChanged { from, to } => {
            log::info!("timeline {} -> {}", from.name(), to.name());
        }
        Diagnostic::CommandRejected { seq, command, error } => {
            log::warn!("command #{} {} rejected: {}", seq, command, error);
        }
        Diagnostic::StaleDelivery { delivered, current } => {
            log::debug!(
                "discarded asset for generation {} (current {})",
                delivered.0,
                current.0
            );
        }
        Diagnostic::IgnoredAfterReset { command } => {
            log::debug!("{} ignored after reset", command);
        }
        Diagnostic::OversizedBuffer { frames } => {
            log::warn!("callback requested {} frames, rendering in chunks", frames);
        }
        Diagnostic::EventsDropped { total } => {
            log::warn!("event ring full, {} events dropped so far", total);
        }
    }
}
