//! Simulated media engine
//!
//! An in-process [`MediaEngine`] whose properties are set from the outside
//! through a [`SimController`]. It records every call made on it and counts
//! observer registration mistakes (closing without an open, opening twice),
//! which makes it the test double for the player layer and the engine behind
//! the CLI's scripted scenarios.

use crate::{
    engine::{EngineSignal, EngineStatus, EventSink, ItemStatus, MediaEngine, SeekTicket},
    types::{SourceDescriptor, SurfaceLayout, TimeRange},
    Error, Result,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

/// A call the player made on the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Open(Url),
    Close,
    Play,
    Pause,
    Seek { to: f64, ticket: SeekTicket },
    SetRate(f32),
    SetMuted(bool),
    AttachSurface,
    DetachSurface,
    LayoutSurface(SurfaceLayout),
}

#[derive(Debug)]
struct SimState {
    sink: Option<EventSink>,
    rejected: HashSet<String>,
    item_status: ItemStatus,
    engine_status: EngineStatus,
    error: Option<String>,
    position: f64,
    duration: Option<f64>,
    playing: bool,
    preferred_rate: f32,
    muted: bool,
    likely_to_keep_up: bool,
    buffer_full: bool,
    buffer_empty: bool,
    loaded: Vec<TimeRange>,
    pending_seek: Option<(f64, SeekTicket)>,
    surface_attached: bool,
    surface_layout: Option<SurfaceLayout>,
    calls: Vec<EngineCall>,
    observer_errors: u32,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            sink: None,
            rejected: HashSet::new(),
            item_status: ItemStatus::Unknown,
            engine_status: EngineStatus::Unknown,
            error: None,
            position: 0.0,
            duration: None,
            playing: false,
            preferred_rate: 1.0,
            muted: false,
            likely_to_keep_up: false,
            buffer_full: false,
            buffer_empty: false,
            loaded: Vec::new(),
            pending_seek: None,
            surface_attached: false,
            surface_layout: None,
            calls: Vec::new(),
            observer_errors: 0,
        }
    }
}

impl SimState {
    fn reset_item(&mut self) {
        self.item_status = ItemStatus::Unknown;
        self.engine_status = EngineStatus::Unknown;
        self.error = None;
        self.position = 0.0;
        self.duration = None;
        self.playing = false;
        self.likely_to_keep_up = false;
        self.buffer_full = false;
        self.buffer_empty = false;
        self.loaded.clear();
        self.pending_seek = None;
    }

    fn emit(&self, signal: EngineSignal) {
        if let Some(sink) = &self.sink {
            sink.emit(signal);
        }
    }
}

fn lock(shared: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Engine half, handed to the player layer
#[derive(Debug)]
pub struct SimulatedEngine {
    shared: Arc<Mutex<SimState>>,
}

/// Control half, kept by the test or scenario script
#[derive(Debug, Clone)]
pub struct SimController {
    shared: Arc<Mutex<SimState>>,
}

impl SimulatedEngine {
    pub fn new() -> (Self, SimController) {
        let shared = Arc::new(Mutex::new(SimState::default()));
        (
            Self {
                shared: shared.clone(),
            },
            SimController { shared },
        )
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.shared)
    }
}

impl MediaEngine for SimulatedEngine {
    fn open(&mut self, source: &SourceDescriptor, sink: EventSink) -> Result<()> {
        let mut state = self.state();
        state.calls.push(EngineCall::Open(source.locator.clone()));
        if state.rejected.contains(source.locator.as_str()) {
            return Err(Error::unresolvable(&source.locator, "locator is not playable"));
        }
        if state.sink.is_some() {
            state.observer_errors += 1;
        }
        state.reset_item();
        state.sink = Some(sink);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.calls.push(EngineCall::Close);
        if state.sink.take().is_none() {
            state.observer_errors += 1;
        }
        state.reset_item();
    }

    fn play(&mut self) {
        let mut state = self.state();
        state.calls.push(EngineCall::Play);
        state.playing = true;
    }

    fn pause(&mut self) {
        let mut state = self.state();
        state.calls.push(EngineCall::Pause);
        state.playing = false;
    }

    fn seek(&mut self, to: f64, ticket: SeekTicket) {
        let mut state = self.state();
        state.calls.push(EngineCall::Seek { to, ticket });
        if let Some((_, superseded)) = state.pending_seek.replace((to, ticket)) {
            state.emit(EngineSignal::SeekCompleted {
                ticket: superseded,
                finished: false,
            });
        }
    }

    fn set_rate(&mut self, rate: f32) {
        let mut state = self.state();
        state.calls.push(EngineCall::SetRate(rate));
        state.preferred_rate = rate;
    }

    fn set_muted(&mut self, muted: bool) {
        let mut state = self.state();
        state.calls.push(EngineCall::SetMuted(muted));
        state.muted = muted;
    }

    fn attach_surface(&mut self) {
        let mut state = self.state();
        state.calls.push(EngineCall::AttachSurface);
        state.surface_attached = true;
    }

    fn detach_surface(&mut self) {
        let mut state = self.state();
        state.calls.push(EngineCall::DetachSurface);
        state.surface_attached = false;
    }

    fn layout_surface(&mut self, layout: SurfaceLayout) {
        let mut state = self.state();
        state.calls.push(EngineCall::LayoutSurface(layout));
        state.surface_layout = Some(layout);
    }

    fn item_status(&self) -> ItemStatus {
        self.state().item_status
    }

    fn engine_status(&self) -> EngineStatus {
        self.state().engine_status
    }

    fn error_message(&self) -> Option<String> {
        self.state().error.clone()
    }

    fn current_time(&self) -> f64 {
        self.state().position
    }

    fn duration(&self) -> Option<f64> {
        self.state().duration
    }

    fn rate(&self) -> f32 {
        let state = self.state();
        if state.playing {
            state.preferred_rate
        } else {
            0.0
        }
    }

    fn is_playback_likely_to_keep_up(&self) -> bool {
        self.state().likely_to_keep_up
    }

    fn is_playback_buffer_full(&self) -> bool {
        self.state().buffer_full
    }

    fn is_playback_buffer_empty(&self) -> bool {
        self.state().buffer_empty
    }

    fn loaded_time_ranges(&self) -> Vec<TimeRange> {
        self.state().loaded.clone()
    }
}

impl SimController {
    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.shared)
    }

    /// Make future opens of `locator` fail
    pub fn reject(&self, locator: &str) {
        self.state().rejected.insert(locator.to_string());
    }

    /// Item and engine become ready
    pub fn ready(&self) {
        let mut state = self.state();
        state.item_status = ItemStatus::ReadyToPlay;
        state.engine_status = EngineStatus::ReadyToPlay;
        state.emit(EngineSignal::StatusChanged);
    }

    pub fn fail_item(&self, message: &str) {
        let mut state = self.state();
        state.item_status = ItemStatus::Failed;
        state.error = Some(message.to_string());
        state.emit(EngineSignal::StatusChanged);
    }

    /// Engine-level failure; surfaces as the rate dropping to zero
    pub fn fail_engine(&self, message: &str) {
        let mut state = self.state();
        state.engine_status = EngineStatus::Failed;
        state.error = Some(message.to_string());
        state.playing = false;
        state.emit(EngineSignal::RateChanged);
    }

    pub fn set_duration(&self, duration: f64) {
        self.state().duration = Some(duration);
    }

    pub fn set_position(&self, position: f64) {
        self.state().position = position;
    }

    pub fn set_likely_to_keep_up(&self, likely: bool) {
        let mut state = self.state();
        state.likely_to_keep_up = likely;
        if likely {
            state.buffer_empty = false;
        }
        state.emit(EngineSignal::LikelyToKeepUpChanged);
    }

    pub fn set_buffer_full(&self, full: bool) {
        self.state().buffer_full = full;
    }

    /// Buffer runs dry
    pub fn buffer_empty(&self) {
        let mut state = self.state();
        state.buffer_empty = true;
        state.buffer_full = false;
        state.likely_to_keep_up = false;
        state.emit(EngineSignal::BufferEmptyChanged);
    }

    pub fn set_loaded(&self, ranges: Vec<TimeRange>) {
        let mut state = self.state();
        state.loaded = ranges;
        state.emit(EngineSignal::LoadedRangesChanged);
    }

    /// Advance the position while playing
    pub fn advance(&self, seconds: f64) {
        let mut state = self.state();
        if state.playing {
            let rate = f64::from(state.preferred_rate);
            let next = state.position + seconds * rate;
            state.position = match state.duration {
                Some(total) => next.min(total),
                None => next,
            };
        }
    }

    /// Reach end of stream
    pub fn play_to_end(&self) {
        let mut state = self.state();
        if let Some(total) = state.duration {
            state.position = total;
        }
        state.playing = false;
        state.emit(EngineSignal::PlayedToEnd);
    }

    /// Land the outstanding seek. Returns false if there was none.
    pub fn complete_seek(&self) -> bool {
        let mut state = self.state();
        match state.pending_seek.take() {
            Some((to, ticket)) => {
                state.position = to;
                state.emit(EngineSignal::SeekCompleted {
                    ticket,
                    finished: true,
                });
                true
            }
            None => false,
        }
    }

    /// Raise an arbitrary signal on the current session
    pub fn emit(&self, signal: EngineSignal) {
        self.state().emit(signal);
    }

    /// The sink of the current session, if one is open
    pub fn sink(&self) -> Option<EventSink> {
        self.state().sink.clone()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Offsets of every seek issued, in order
    pub fn seeks(&self) -> Vec<f64> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::Seek { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn observer_errors(&self) -> u32 {
        self.state().observer_errors
    }

    pub fn is_observed(&self) -> bool {
        self.state().sink.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn position(&self) -> f64 {
        self.state().position
    }

    pub fn is_muted(&self) -> bool {
        self.state().muted
    }

    pub fn surface_attached(&self) -> bool {
        self.state().surface_attached
    }

    pub fn surface_layout(&self) -> Option<SurfaceLayout> {
        self.state().surface_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSignals;
    use crate::types::SessionId;

    fn open(engine: &mut SimulatedEngine) -> EngineSignals {
        let (tx, signals) = EngineSignals::channel();
        let source = SourceDescriptor::parse("https://cdn.example.com/a.mp4").unwrap();
        engine.open(&source, EventSink::new(SessionId::new(), tx)).unwrap();
        signals
    }

    #[test]
    fn test_close_without_open_is_an_observer_error() {
        let (mut engine, controller) = SimulatedEngine::new();
        engine.close();
        assert_eq!(controller.observer_errors(), 1);

        let _signals = open(&mut engine);
        engine.close();
        assert_eq!(controller.observer_errors(), 1);
    }

    #[test]
    fn test_superseded_seek_reports_unfinished() {
        let (mut engine, controller) = SimulatedEngine::new();
        let mut signals = open(&mut engine);

        engine.seek(10.0, SeekTicket(1));
        engine.seek(20.0, SeekTicket(2));
        assert_eq!(
            signals.try_recv().map(|e| e.signal),
            Some(EngineSignal::SeekCompleted {
                ticket: SeekTicket(1),
                finished: false
            })
        );

        assert!(controller.complete_seek());
        assert_eq!(controller.position(), 20.0);
        assert!(!controller.complete_seek());
    }

    #[test]
    fn test_rate_reflects_play_state() {
        let (mut engine, controller) = SimulatedEngine::new();
        let _signals = open(&mut engine);
        controller.set_duration(10.0);
        engine.set_rate(2.0);
        assert_eq!(engine.rate(), 0.0);

        engine.play();
        assert_eq!(engine.rate(), 2.0);
        controller.advance(3.0);
        assert_eq!(controller.position(), 6.0);
        controller.advance(10.0);
        assert_eq!(controller.position(), 10.0);
    }

    #[test]
    fn test_rejected_locator() {
        let (mut engine, controller) = SimulatedEngine::new();
        controller.reject("https://cdn.example.com/a.mp4");
        let (tx, _signals) = EngineSignals::channel();
        let source = SourceDescriptor::parse("https://cdn.example.com/a.mp4").unwrap();
        let err = engine
            .open(&source, EventSink::new(SessionId::new(), tx))
            .unwrap_err();
        assert!(matches!(err, Error::SourceResolution { .. }));
        assert!(!controller.is_observed());
    }
}
