//! Player layer - reconciles engine signals into a playback state
//!
//! Owns exactly one engine session at a time and:
//! - maps item/engine status, buffer and end-of-stream signals onto
//!   [`PlaybackState`], emitting only real edges
//! - queues seeks issued before the item is ready and applies them before
//!   readiness is declared
//! - samples position and buffering on a fixed poll interval
//! - retries an empty buffer after a cool-down
//! - tears the session down (observers, timer, surface) before replacing or
//!   disposing it

use crate::{
    config::PlayerConfig,
    engine::{
        EngineEvent, EngineSignal, EngineSignals, EngineStatus, EventSink, ItemStatus,
        MediaEngine, SeekTicket,
    },
    timer::{earliest, Countdown, PollTimer},
    types::*,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Called once a seek has landed
pub type SeekCompletion = Box<dyn FnOnce() + Send>;

/// Callbacks raised by the player layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    StateChanged { state: PlaybackState },
    PlayTimeChanged { current: f64, total: f64 },
    LoadedTimeChanged { loaded: f64, total: f64 },
    IsPlayingChanged { playing: bool },
    /// The buffer was still short after a cool-down; another one started
    BufferingRetry { attempt: u32 },
}

struct PendingSeek {
    offset: f64,
    completion: Option<SeekCompletion>,
}

struct InFlightSeek {
    ticket: SeekTicket,
    completion: Option<SeekCompletion>,
    /// Readiness is declared once this seek lands
    settles_readiness: bool,
}

struct Session {
    id: SessionId,
    source: SourceDescriptor,
    has_ready_to_play: bool,
}

/// Adapter around one [`MediaEngine`]
pub struct PlayerLayer<E: MediaEngine> {
    engine: E,
    config: PlayerConfig,
    signals_tx: mpsc::UnboundedSender<EngineEvent>,
    session: Option<Session>,
    state: PlaybackState,
    state_tx: watch::Sender<PlaybackState>,
    is_playing: bool,
    should_seek_to: Option<PendingSeek>,
    in_flight_seek: Option<InFlightSeek>,
    next_ticket: u64,
    poll: PollTimer,
    retry: Countdown,
    retry_attempts: u32,
    /// The engine was paused by a buffering retry, not by the user
    paused_for_retry: bool,
    surface_attached: bool,
    aspect_ratio: AspectRatio,
    bounds: Option<Rect>,
    rate: f32,
    muted: bool,
    last_error: Option<Error>,
    outbox: Vec<PlayerEvent>,
    disposed: bool,
}

impl<E: MediaEngine> PlayerLayer<E> {
    /// Create a layer and the receiver its engine signals arrive on
    pub fn new(engine: E, config: PlayerConfig) -> (Self, EngineSignals) {
        let (signals_tx, signals) = EngineSignals::channel();
        let (state_tx, _) = watch::channel(PlaybackState::NotSet);

        let layer = Self {
            engine,
            poll: PollTimer::new(config.poll_interval),
            aspect_ratio: config.aspect_ratio,
            rate: config.playback_rate,
            config,
            signals_tx,
            session: None,
            state: PlaybackState::NotSet,
            state_tx,
            is_playing: false,
            should_seek_to: None,
            in_flight_seek: None,
            next_ticket: 0,
            retry: Countdown::new(),
            retry_attempts: 0,
            paused_for_retry: false,
            surface_attached: false,
            bounds: None,
            muted: false,
            last_error: None,
            outbox: Vec::new(),
            disposed: false,
        };
        (layer, signals)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn current_source(&self) -> Option<&SourceDescriptor> {
        self.session.as_ref().map(|s| &s.source)
    }

    /// Why the session is in the `Error` state
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Offset of a seek waiting for the item to become ready
    pub fn pending_seek(&self) -> Option<f64> {
        self.should_seek_to.as_ref().map(|p| p.offset)
    }

    pub fn poll_timer(&self) -> &PollTimer {
        &self.poll
    }

    pub fn is_retrying_buffer(&self) -> bool {
        self.retry.is_pending()
    }

    pub fn is_surface_attached(&self) -> bool {
        self.surface_attached
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn current_time(&self) -> Option<f64> {
        self.session.as_ref().map(|_| self.engine.current_time())
    }

    pub fn duration(&self) -> Option<f64> {
        self.session.as_ref().and_then(|_| self.engine.duration())
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Take every callback raised since the last call
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Earliest instant a timer needs servicing
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.disposed {
            return None;
        }
        earliest(self.poll.deadline(), self.retry.deadline())
    }

    /// Replace the current session with one built from `source`
    #[instrument(skip(self, source, now), fields(locator = %source.locator))]
    pub fn load_source(&mut self, source: &SourceDescriptor, now: Instant) {
        if self.disposed {
            warn!("Load ignored: player disposed");
            return;
        }

        self.teardown();
        self.last_error = None;
        self.retry_attempts = 0;
        self.state = PlaybackState::NotSet;

        let id = SessionId::new();
        let sink = EventSink::new(id, self.signals_tx.clone());

        info!(session_id = %id, kind = %source.kind(), "Loading source");

        if let Err(err) = self.engine.open(source, sink) {
            warn!(error = %err, "Source could not be opened");
            self.fail(err);
            return;
        }

        self.session = Some(Session {
            id,
            source: source.clone(),
            has_ready_to_play: false,
        });
        self.engine.set_rate(self.rate);
        self.engine.set_muted(self.muted);
        self.attach_surface();
        self.set_state(PlaybackState::Buffering);
        self.poll.start(now);
    }

    /// Start playback
    pub fn play(&mut self, now: Instant) {
        if self.disposed || self.session.is_none() {
            debug!("Play ignored: no session");
            return;
        }
        if self.state.is_terminal() {
            debug!(state = %self.state, "Play ignored: session finished");
            return;
        }

        self.engine.play();
        self.poll.start(now);
        self.set_playing(true);
    }

    /// Pause playback; the poll timer is suspended, not destroyed
    pub fn pause(&mut self) {
        if self.disposed {
            return;
        }
        if self.session.is_some() {
            self.engine.pause();
        }
        self.paused_for_retry = false;
        self.poll.suspend();
        self.set_playing(false);
    }

    /// Seek to `to` seconds.
    ///
    /// Before the item is ready the offset is queued and applied right before
    /// readiness is declared. A newer seek replaces a queued or in-flight one;
    /// the replaced completion is dropped without being called.
    #[instrument(skip(self, completion, now))]
    pub fn seek(&mut self, to: f64, completion: Option<SeekCompletion>, now: Instant) {
        if self.disposed {
            return;
        }
        if !to.is_finite() {
            debug!("Seek ignored: offset is not finite");
            return;
        }
        if self.state.is_terminal() {
            debug!(state = %self.state, "Seek ignored: session finished");
            return;
        }
        let to = to.max(0.0);

        let item_ready =
            self.session.is_some() && self.engine.item_status() == ItemStatus::ReadyToPlay;

        if !item_ready {
            info!(to, "Item not ready, queueing seek");
            self.should_seek_to = Some(PendingSeek {
                offset: to,
                completion,
            });
            return;
        }

        let settles_readiness = self
            .in_flight_seek
            .as_ref()
            .is_some_and(|s| s.settles_readiness);
        self.issue_seek(to, completion, settles_readiness);
        self.poll.start(now);
    }

    /// Change the playback rate
    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidRate(rate));
        }
        self.rate = rate;
        if self.session.is_some() {
            self.engine.set_rate(rate);
        }
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if self.session.is_some() {
            self.engine.set_muted(muted);
        }
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.aspect_ratio = aspect_ratio;
        self.relayout();
    }

    /// Container bounds changed
    pub fn layout(&mut self, bounds: Rect) {
        self.bounds = Some(bounds);
        self.relayout();
    }

    /// Release the render surface while the app is inactive
    pub fn enter_background(&mut self) {
        if self.surface_attached {
            debug!("Detaching render surface");
            self.engine.detach_surface();
            self.surface_attached = false;
        }
    }

    pub fn enter_foreground(&mut self) {
        if !self.disposed && self.session.is_some() && !self.surface_attached {
            debug!("Reattaching render surface");
            self.attach_surface();
        }
    }

    /// Tear everything down. Safe to call any number of times.
    #[instrument(skip(self))]
    pub fn dispose(&mut self) {
        if self.disposed {
            debug!("Already disposed");
            return;
        }
        self.disposed = true;
        self.teardown();
        self.should_seek_to = None;
        info!("Player disposed");
    }

    /// Handle one engine signal
    pub fn handle_signal(&mut self, event: EngineEvent, now: Instant) {
        if self.disposed {
            return;
        }
        match &self.session {
            Some(session) if session.id == event.session => {}
            _ => {
                debug!(
                    session_id = %event.session,
                    signal = ?event.signal,
                    "Dropping signal from stale session"
                );
                return;
            }
        }

        match event.signal {
            EngineSignal::StatusChanged => self.on_status_changed(),
            EngineSignal::LoadedRangesChanged => self.on_loaded_ranges_changed(),
            EngineSignal::BufferEmptyChanged => self.on_buffer_empty_changed(now),
            EngineSignal::LikelyToKeepUpChanged => self.on_likely_to_keep_up_changed(),
            EngineSignal::RateChanged => self.on_rate_changed(),
            EngineSignal::PlayedToEnd => self.played_to_end(),
            EngineSignal::SeekCompleted { ticket, finished } => {
                self.on_seek_completed(ticket, finished)
            }
        }
    }

    /// Handle every signal already queued. Returns how many were handled.
    pub fn pump(&mut self, signals: &mut EngineSignals, now: Instant) -> usize {
        let mut handled = 0;
        while let Some(event) = signals.try_recv() {
            self.handle_signal(event, now);
            handled += 1;
        }
        handled
    }

    /// Service whichever timers are due at `now`
    pub fn on_timer(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        if self.retry.take_due(now) {
            self.on_retry_elapsed(now);
        }
        if self.poll.take_due(now) {
            self.poll_tick();
        }
    }

    // ------------------------------------------------------------------
    // Signal handlers
    // ------------------------------------------------------------------

    fn on_status_changed(&mut self) {
        if let Some(err) = self.engine_failure() {
            self.fail(err);
            return;
        }

        if self.engine.item_status() != ItemStatus::ReadyToPlay {
            self.set_state(PlaybackState::Buffering);
            return;
        }
        // later status notifications (engine ready, repeats) are not a new readiness
        if self.has_ready_to_play() && self.should_seek_to.is_none() {
            return;
        }

        self.set_state(PlaybackState::Buffering);
        if let Some(pending) = self.should_seek_to.take() {
            info!(to = pending.offset, "Applying queued seek before declaring readiness");
            self.issue_seek(pending.offset, pending.completion, true);
        } else if self
            .in_flight_seek
            .as_ref()
            .is_some_and(|s| s.settles_readiness)
        {
            debug!("Readiness waits for in-flight seek");
        } else {
            self.declare_ready();
        }
    }

    fn on_loaded_ranges_changed(&mut self) {
        let ranges = self.engine.loaded_time_ranges();
        if let (Some(first), Some(total)) = (ranges.first(), self.engine.duration()) {
            self.emit(PlayerEvent::LoadedTimeChanged {
                loaded: first.end(),
                total,
            });
        }
    }

    fn on_buffer_empty_changed(&mut self, now: Instant) {
        if self.engine.is_playback_buffer_empty() && !self.state.is_terminal() {
            self.begin_buffering_retry(now);
        }
    }

    fn on_likely_to_keep_up_changed(&mut self) {
        if self.engine.is_playback_likely_to_keep_up()
            && self.has_ready_to_play()
            && !self.retry.is_pending()
        {
            self.set_state(PlaybackState::BufferFinished);
            self.resume_after_stall();
        }
    }

    fn on_rate_changed(&mut self) {
        if self.engine.rate() != 0.0 {
            return;
        }
        if let Some(err) = self.engine_failure() {
            self.fail(err);
        } else if self.reached_end() {
            self.played_to_end();
        }
    }

    fn on_seek_completed(&mut self, ticket: SeekTicket, finished: bool) {
        match self.in_flight_seek.take() {
            Some(seek) if seek.ticket == ticket => {
                debug!(ticket = ticket.0, finished, "Seek completed");
                if let Some(completion) = seek.completion {
                    completion();
                }
                if seek.settles_readiness {
                    self.declare_ready();
                }
            }
            other => {
                debug!(ticket = ticket.0, "Ignoring completion of superseded seek");
                self.in_flight_seek = other;
            }
        }
    }

    fn on_retry_elapsed(&mut self, now: Instant) {
        if self.session.is_none() {
            return;
        }

        if !self.engine.is_playback_likely_to_keep_up() {
            self.retry_attempts += 1;
            if let Some(max) = self.config.max_buffering_retries {
                if self.retry_attempts > max {
                    warn!(
                        attempts = self.retry_attempts,
                        "Buffer still short, giving up retrying"
                    );
                    self.retry_attempts = 0;
                    return;
                }
            }
            debug!(attempt = self.retry_attempts, "Buffer still short, waiting again");
            self.emit(PlayerEvent::BufferingRetry {
                attempt: self.retry_attempts,
            });
            self.begin_buffering_retry(now);
            return;
        }

        self.retry_attempts = 0;
        if self.has_ready_to_play() {
            self.set_state(PlaybackState::BufferFinished);
        }
        self.resume_after_stall();
    }

    fn poll_tick(&mut self) {
        if self.session.is_none() {
            return;
        }

        if let Some(total) = self.engine.duration() {
            self.emit(PlayerEvent::PlayTimeChanged {
                current: self.engine.current_time(),
                total,
            });
        }

        if let Some(err) = self.engine_failure() {
            self.fail(err);
            return;
        }
        if self.reached_end() {
            self.played_to_end();
            return;
        }
        if !self.has_ready_to_play() || self.retry.is_pending() {
            return;
        }

        if self.engine.is_playback_likely_to_keep_up() || self.engine.is_playback_buffer_full() {
            self.set_state(PlaybackState::BufferFinished);
            self.resume_after_stall();
        } else {
            self.set_state(PlaybackState::Buffering);
        }
    }

    fn played_to_end(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(total) = self.engine.duration() {
            self.emit(PlayerEvent::PlayTimeChanged {
                current: total,
                total,
            });
        }
        self.set_state(PlaybackState::PlayedToEnd);
        self.set_playing(false);
        self.poll.invalidate();
        self.retry.cancel();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn begin_buffering_retry(&mut self, now: Instant) {
        self.set_state(PlaybackState::Buffering);
        // the empty-buffer signal can repeat while a cool-down is running
        if self.retry.is_pending() {
            return;
        }
        self.engine.pause();
        self.paused_for_retry = true;
        self.retry.schedule(now, self.config.buffering_retry_delay);
    }

    /// Undo a retry's pause if the user still wants playback
    fn resume_after_stall(&mut self) {
        if std::mem::take(&mut self.paused_for_retry) && self.is_playing {
            debug!("Resuming engine after stall");
            self.engine.play();
        }
    }

    fn issue_seek(&mut self, to: f64, completion: Option<SeekCompletion>, settles_readiness: bool) {
        self.next_ticket += 1;
        let ticket = SeekTicket(self.next_ticket);
        info!(to, ticket = ticket.0, "Seeking");
        self.in_flight_seek = Some(InFlightSeek {
            ticket,
            completion,
            settles_readiness,
        });
        self.engine.seek(to, ticket);
    }

    fn declare_ready(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.has_ready_to_play = true;
        }
        self.set_state(PlaybackState::ReadyToPlay);
    }

    fn has_ready_to_play(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.has_ready_to_play)
    }

    fn engine_failure(&self) -> Option<Error> {
        let failed = self.engine.item_status() == ItemStatus::Failed
            || self.engine.engine_status() == EngineStatus::Failed;
        failed.then(|| {
            Error::Playback(
                self.engine
                    .error_message()
                    .unwrap_or_else(|| "engine reported failure".to_string()),
            )
        })
    }

    fn reached_end(&self) -> bool {
        match self.engine.duration() {
            Some(total) if total > 0.0 => self.engine.current_time() >= total,
            _ => false,
        }
    }

    fn fail(&mut self, err: Error) {
        if self.state.is_terminal() {
            return;
        }
        warn!(error = %err, code = err.error_code(), "Session failed");
        self.last_error = Some(err);
        self.set_state(PlaybackState::Error);
        self.set_playing(false);
        self.poll.invalidate();
        self.retry.cancel();
    }

    fn attach_surface(&mut self) {
        self.engine.attach_surface();
        self.surface_attached = true;
        self.relayout();
    }

    fn relayout(&mut self) {
        if let (true, Some(bounds)) = (self.surface_attached, self.bounds) {
            self.engine.layout_surface(self.aspect_ratio.layout(bounds));
        }
    }

    /// Unregister observers, stop timers and release the surface
    fn teardown(&mut self) {
        self.retry.cancel();
        self.paused_for_retry = false;
        self.poll.invalidate();
        self.in_flight_seek = None;
        self.set_playing(false);
        if self.surface_attached {
            self.engine.detach_surface();
            self.surface_attached = false;
        }
        if let Some(session) = self.session.take() {
            debug!(session_id = %session.id, "Closing session");
            self.engine.pause();
            self.engine.close();
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if self.is_playing == playing {
            return;
        }
        self.is_playing = playing;
        self.emit(PlayerEvent::IsPlayingChanged { playing });
    }

    /// Transition to new state; same-state and illegal edges are dropped
    fn set_state(&mut self, next: PlaybackState) {
        let current = self.state;
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            debug!(from = %current, to = %next, "Ignoring illegal state transition");
            return;
        }

        self.state = next;
        self.state_tx.send_replace(next);
        info!(from = %current, to = %next, "State transition");
        self.emit(PlayerEvent::StateChanged { state: next });
    }

    fn emit(&mut self, event: PlayerEvent) {
        if !self.disposed {
            self.outbox.push(event);
        }
    }
}

impl<E: MediaEngine> Drop for PlayerLayer<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{EngineCall, SimController, SimulatedEngine};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (PlayerLayer<SimulatedEngine>, EngineSignals, SimController) {
        let (engine, controller) = SimulatedEngine::new();
        let (layer, signals) = PlayerLayer::new(engine, PlayerConfig::default());
        (layer, signals, controller)
    }

    fn source() -> SourceDescriptor {
        SourceDescriptor::parse("https://cdn.example.com/camera/1.mp4").unwrap()
    }

    fn states(events: &[PlayerEvent]) -> Vec<PlaybackState> {
        events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::StateChanged { state } => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let (layer, _signals, _controller) = setup();
        assert_eq!(layer.state(), PlaybackState::NotSet);
        assert!(!layer.is_playing());
        assert!(layer.session_id().is_none());
        assert!(layer.next_deadline().is_none());
    }

    #[test]
    fn test_load_emits_buffering_then_ready() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();

        layer.load_source(&source(), now);
        assert_eq!(layer.state(), PlaybackState::Buffering);
        assert!(controller.is_observed());
        assert!(layer.is_surface_attached());

        controller.ready();
        layer.pump(&mut signals, now);

        let events = layer.drain_events();
        assert_eq!(
            states(&events),
            vec![PlaybackState::Buffering, PlaybackState::ReadyToPlay]
        );
        assert_eq!(*layer.subscribe_state().borrow(), PlaybackState::ReadyToPlay);
    }

    #[test]
    fn test_operations_before_load_are_noops() {
        let (mut layer, _signals, controller) = setup();
        let now = Instant::now();

        layer.play(now);
        layer.pause();
        layer.enter_foreground();
        assert!(!layer.is_playing());
        assert!(layer.drain_events().is_empty());
        assert!(controller.calls().is_empty());
    }

    #[test]
    fn test_play_pause_is_edge_triggered() {
        let (mut layer, _signals, _controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        layer.drain_events();

        layer.play(now);
        layer.play(now);
        layer.pause();
        layer.pause();

        assert_eq!(
            layer.drain_events(),
            vec![
                PlayerEvent::IsPlayingChanged { playing: true },
                PlayerEvent::IsPlayingChanged { playing: false },
            ]
        );
    }

    #[test]
    fn test_nan_seek_is_ignored() {
        let (mut layer, _signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        layer.seek(f64::NAN, None, now);
        assert!(layer.pending_seek().is_none());
        assert!(!controller.calls().iter().any(|c| matches!(c, EngineCall::Seek { .. })));
    }

    #[test]
    fn test_queued_seek_precedes_readiness() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        let completions = Arc::new(AtomicU32::new(0));

        layer.load_source(&source(), now);
        let counter = completions.clone();
        layer.seek(
            30.0,
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            now,
        );
        assert_eq!(layer.pending_seek(), Some(30.0));

        controller.ready();
        layer.pump(&mut signals, now);
        // seek issued, readiness not yet declared
        assert_eq!(layer.state(), PlaybackState::Buffering);
        assert_eq!(controller.seeks(), vec![30.0]);
        assert_eq!(completions.load(Ordering::SeqCst), 0);

        assert!(controller.complete_seek());
        layer.pump(&mut signals, now);
        assert_eq!(layer.state(), PlaybackState::ReadyToPlay);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(controller.position(), 30.0);

        assert_eq!(
            states(&layer.drain_events()),
            vec![PlaybackState::Buffering, PlaybackState::ReadyToPlay]
        );
    }

    #[test]
    fn test_second_seek_replaces_queued_one() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        let first = Arc::new(AtomicU32::new(0));

        layer.load_source(&source(), now);
        let counter = first.clone();
        layer.seek(
            10.0,
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            now,
        );
        layer.seek(45.0, None, now);

        controller.ready();
        layer.pump(&mut signals, now);
        controller.complete_seek();
        layer.pump(&mut signals, now);

        assert_eq!(controller.seeks(), vec![45.0]);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(layer.state(), PlaybackState::ReadyToPlay);
    }

    #[test]
    fn test_ready_seek_goes_straight_to_engine() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        controller.ready();
        layer.pump(&mut signals, now);

        layer.seek(-4.0, None, now);
        assert!(layer.pending_seek().is_none());
        assert_eq!(controller.seeks(), vec![0.0]);
    }

    #[test]
    fn test_failure_is_terminal() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        controller.fail_item("decode error");
        layer.pump(&mut signals, now);

        assert_eq!(layer.state(), PlaybackState::Error);
        assert_eq!(layer.last_error().map(|e| e.error_code()), Some("PLAYBACK"));

        controller.ready();
        layer.pump(&mut signals, now);
        layer.on_timer(now + Duration::from_secs(5));
        assert_eq!(layer.state(), PlaybackState::Error);
        assert_eq!(
            states(&layer.drain_events()),
            vec![PlaybackState::Buffering, PlaybackState::Error]
        );
    }

    #[test]
    fn test_unresolvable_source_enters_error() {
        let (mut layer, _signals, controller) = setup();
        controller.reject("https://cdn.example.com/camera/1.mp4");
        layer.load_source(&source(), Instant::now());

        assert_eq!(layer.state(), PlaybackState::Error);
        assert!(layer.session_id().is_none());
        assert_eq!(
            layer.last_error().map(|e| e.error_code()),
            Some("SOURCE_RESOLUTION")
        );
        assert_eq!(states(&layer.drain_events()), vec![PlaybackState::Error]);
    }

    #[test]
    fn test_stale_session_signals_are_dropped() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        let old_sink = controller.sink().unwrap();

        layer.load_source(&source(), now);
        layer.drain_events();
        old_sink.emit(EngineSignal::PlayedToEnd);
        layer.pump(&mut signals, now);

        assert_eq!(layer.state(), PlaybackState::Buffering);
        assert!(layer.drain_events().is_empty());
        assert_eq!(controller.observer_errors(), 0);
    }

    #[test]
    fn test_reload_closes_previous_session_once() {
        let (mut layer, _signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        layer.play(now);
        layer.load_source(&source(), now);

        let closes = controller
            .calls()
            .iter()
            .filter(|c| **c == EngineCall::Close)
            .count();
        assert_eq!(closes, 1);
        assert!(!layer.is_playing());
        assert_eq!(layer.poll_timer().invalidations(), 1);
    }

    #[test]
    fn test_poll_tick_reports_time_and_buffering() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        controller.set_duration(120.0);
        controller.ready();
        layer.pump(&mut signals, now);
        layer.play(now);
        layer.drain_events();

        controller.set_position(12.5);
        controller.set_likely_to_keep_up(true);
        layer.pump(&mut signals, now);
        layer.on_timer(now);

        assert_eq!(
            layer.drain_events(),
            vec![
                PlayerEvent::StateChanged {
                    state: PlaybackState::BufferFinished
                },
                PlayerEvent::PlayTimeChanged {
                    current: 12.5,
                    total: 120.0
                },
            ]
        );

        controller.set_likely_to_keep_up(false);
        layer.on_timer(now + Duration::from_millis(500));
        assert_eq!(layer.state(), PlaybackState::Buffering);
    }

    #[test]
    fn test_loaded_time_uses_first_range() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        controller.set_duration(60.0);
        controller.set_loaded(vec![TimeRange::new(5.0, 10.0), TimeRange::new(40.0, 5.0)]);
        layer.pump(&mut signals, now);

        assert!(layer.drain_events().contains(&PlayerEvent::LoadedTimeChanged {
            loaded: 15.0,
            total: 60.0
        }));
    }

    #[test]
    fn test_buffer_retry_settles_and_resumes() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        controller.ready();
        layer.pump(&mut signals, now);
        layer.play(now);
        controller.clear_calls();

        controller.buffer_empty();
        layer.pump(&mut signals, now);
        assert!(layer.is_retrying_buffer());
        assert!(controller.calls().contains(&EngineCall::Pause));
        assert!(layer.is_playing());

        controller.set_likely_to_keep_up(true);
        layer.pump(&mut signals, now);
        // the cool-down decides, not the keep-up signal
        assert_eq!(layer.state(), PlaybackState::Buffering);

        layer.on_timer(now + Duration::from_secs(1));
        assert_eq!(layer.state(), PlaybackState::BufferFinished);
        assert_eq!(controller.calls().last(), Some(&EngineCall::Play));
    }

    #[test]
    fn test_bounded_retries_stop() {
        let (engine, controller) = SimulatedEngine::new();
        let config = PlayerConfig {
            max_buffering_retries: Some(2),
            ..Default::default()
        };
        let (mut layer, mut signals) = PlayerLayer::new(engine, config);
        let mut now = Instant::now();
        layer.load_source(&source(), now);
        controller.ready();
        layer.pump(&mut signals, now);
        controller.buffer_empty();
        layer.pump(&mut signals, now);
        layer.drain_events();

        for _ in 0..4 {
            now += Duration::from_secs(1);
            layer.on_timer(now);
        }
        let retries: Vec<_> = layer
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::BufferingRetry { .. }))
            .collect();
        assert_eq!(retries.len(), 2);
        assert!(!layer.is_retrying_buffer());
    }

    #[test]
    fn test_repeated_status_after_ready_is_silent() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        controller.ready();
        controller.set_likely_to_keep_up(true);
        layer.pump(&mut signals, now);
        assert_eq!(layer.state(), PlaybackState::BufferFinished);
        layer.drain_events();

        controller.emit(EngineSignal::StatusChanged);
        controller.ready();
        layer.pump(&mut signals, now);

        assert!(states(&layer.drain_events()).is_empty());
        assert_eq!(layer.state(), PlaybackState::BufferFinished);
    }

    #[test]
    fn test_giving_up_retries_still_resumes_and_resets() {
        let (engine, controller) = SimulatedEngine::new();
        let config = PlayerConfig {
            max_buffering_retries: Some(1),
            ..Default::default()
        };
        let (mut layer, mut signals) = PlayerLayer::new(engine, config);
        let mut now = Instant::now();
        layer.load_source(&source(), now);
        controller.ready();
        layer.pump(&mut signals, now);
        layer.play(now);

        controller.buffer_empty();
        layer.pump(&mut signals, now);
        for _ in 0..3 {
            now += Duration::from_secs(1);
            layer.on_timer(now);
        }
        assert!(!layer.is_retrying_buffer());
        assert!(!controller.is_playing());

        controller.set_likely_to_keep_up(true);
        layer.pump(&mut signals, now);
        assert_eq!(layer.state(), PlaybackState::BufferFinished);
        assert!(layer.is_playing());
        assert!(controller.is_playing());
        layer.drain_events();

        // a later stall gets its full retry budget again
        controller.buffer_empty();
        layer.pump(&mut signals, now);
        now += Duration::from_secs(1);
        layer.on_timer(now);
        assert!(layer
            .drain_events()
            .contains(&PlayerEvent::BufferingRetry { attempt: 1 }));
        assert!(layer.is_retrying_buffer());
    }

    #[test]
    fn test_poll_tick_resumes_after_abandoned_retry() {
        let (engine, controller) = SimulatedEngine::new();
        let config = PlayerConfig {
            max_buffering_retries: Some(0),
            ..Default::default()
        };
        let (mut layer, mut signals) = PlayerLayer::new(engine, config);
        let mut now = Instant::now();
        layer.load_source(&source(), now);
        controller.ready();
        layer.pump(&mut signals, now);
        layer.play(now);
        controller.buffer_empty();
        layer.pump(&mut signals, now);

        now += Duration::from_secs(1);
        layer.on_timer(now);
        assert!(!controller.is_playing());

        controller.set_buffer_full(true);
        now += Duration::from_millis(500);
        layer.on_timer(now);
        assert_eq!(layer.state(), PlaybackState::BufferFinished);
        assert!(controller.is_playing());
    }

    #[test]
    fn test_background_detaches_surface_only() {
        let (mut layer, _signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        layer.play(now);

        layer.enter_background();
        assert!(!layer.is_surface_attached());
        assert!(!controller.surface_attached());
        assert!(controller.is_observed());
        assert!(layer.is_playing());

        layer.enter_foreground();
        assert!(controller.surface_attached());
    }

    #[test]
    fn test_layout_follows_aspect_ratio() {
        let (mut layer, _signals, controller) = setup();
        layer.layout(Rect::with_size(320.0, 240.0));
        layer.load_source(&source(), Instant::now());
        layer.set_aspect_ratio(AspectRatio::SixteenNine);

        assert_eq!(
            controller.surface_layout().map(|l| l.frame),
            Some(Rect::new(0.0, 0.0, 320.0, 180.0))
        );
    }

    #[test]
    fn test_rate_validation() {
        let (mut layer, _signals, controller) = setup();
        layer.load_source(&source(), Instant::now());
        assert!(matches!(layer.set_rate(0.0), Err(Error::InvalidRate(_))));
        assert!(layer.set_rate(1.5).is_ok());
        assert!(controller.calls().contains(&EngineCall::SetRate(1.5)));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut layer, mut signals, controller) = setup();
        let now = Instant::now();
        layer.load_source(&source(), now);
        layer.play(now);
        layer.drain_events();

        layer.dispose();
        layer.dispose();
        controller.ready();
        layer.pump(&mut signals, now);
        layer.on_timer(now + Duration::from_secs(10));

        assert!(layer.is_disposed());
        assert!(layer.drain_events().is_empty());
        assert_eq!(controller.observer_errors(), 0);
        assert!(!controller.is_observed());
        assert_eq!(layer.poll_timer().invalidations(), 1);
    }
}
