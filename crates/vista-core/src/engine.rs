//! Native media engine seam
//!
//! The platform player (decoder, renderer, network stack) sits behind
//! [`MediaEngine`]. Instead of string-keyed property observers the engine
//! reports changes as typed [`EngineSignal`]s through the [`EventSink`] it is
//! handed when a source is opened. Every signal carries the id of the session
//! it belongs to, so anything still in flight after a teardown is recognisable
//! and dropped by the player layer.

use crate::{
    types::{SessionId, SourceDescriptor, SurfaceLayout, TimeRange},
    Result,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Status of the currently loaded item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

/// Status of the engine itself, independent of the item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

/// Correlates a seek request with its completion signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeekTicket(pub u64);

/// Property change or lifecycle notification raised by the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum EngineSignal {
    /// Item or engine status changed
    StatusChanged,
    /// Loaded time ranges grew or moved
    LoadedRangesChanged,
    /// The playback buffer ran dry (or refilled)
    BufferEmptyChanged,
    /// The engine's keep-up prediction changed
    LikelyToKeepUpChanged,
    /// Effective playback rate changed
    RateChanged,
    /// End of stream reached
    PlayedToEnd,
    /// A seek issued with `ticket` has settled
    SeekCompleted { ticket: SeekTicket, finished: bool },
}

/// A signal tagged with the session that raised it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineEvent {
    pub session: SessionId,
    pub signal: EngineSignal,
}

/// Handle the engine uses to report signals for one session
#[derive(Debug, Clone)]
pub struct EventSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub(crate) fn new(session: SessionId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Report a signal. Returns false once the receiving side is gone.
    pub fn emit(&self, signal: EngineSignal) -> bool {
        self.tx
            .send(EngineEvent {
                session: self.session,
                signal,
            })
            .is_ok()
    }
}

/// Receiving end of every session's signals
#[derive(Debug)]
pub struct EngineSignals {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EngineSignals {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<EngineEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    /// Take a signal if one is queued
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }
}

/// The platform media engine.
///
/// All calls happen on the player's single logical thread. `open` registers
/// the sink (the engine's observers) and `close` must release it again; the
/// player layer guarantees exactly one `close` per successful `open`.
pub trait MediaEngine: Send {
    /// Build a new item from `source` and start observing it
    fn open(&mut self, source: &SourceDescriptor, sink: EventSink) -> Result<()>;
    /// Drop the current item and stop observing it
    fn close(&mut self);

    fn play(&mut self);
    fn pause(&mut self);
    /// Start an exact seek; completion is reported as `SeekCompleted { ticket }`
    fn seek(&mut self, to: f64, ticket: SeekTicket);
    fn set_rate(&mut self, rate: f32);
    fn set_muted(&mut self, muted: bool);

    fn attach_surface(&mut self);
    fn detach_surface(&mut self);
    fn layout_surface(&mut self, layout: SurfaceLayout);

    fn item_status(&self) -> ItemStatus;
    fn engine_status(&self) -> EngineStatus;
    fn error_message(&self) -> Option<String>;
    /// Current position in seconds
    fn current_time(&self) -> f64;
    /// Item duration in seconds, None until known
    fn duration(&self) -> Option<f64>;
    fn rate(&self) -> f32;
    fn is_playback_likely_to_keep_up(&self) -> bool;
    fn is_playback_buffer_full(&self) -> bool;
    fn is_playback_buffer_empty(&self) -> bool;
    fn loaded_time_ranges(&self) -> Vec<TimeRange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_session() {
        let (tx, mut signals) = EngineSignals::channel();
        let session = SessionId::new();
        let sink = EventSink::new(session, tx);

        assert!(sink.emit(EngineSignal::StatusChanged));
        let event = signals.try_recv().unwrap();
        assert_eq!(event.session, session);
        assert_eq!(event.signal, EngineSignal::StatusChanged);
        assert!(signals.try_recv().is_none());
    }

    #[test]
    fn test_sink_reports_closed_receiver() {
        let (tx, signals) = EngineSignals::channel();
        let sink = EventSink::new(SessionId::new(), tx);
        drop(signals);
        assert!(!sink.emit(EngineSignal::PlayedToEnd));
    }
}
