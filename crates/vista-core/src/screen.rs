//! Screen - composes the player layer and the control overlay
//!
//! Supplies resources to the player, routes player callbacks into the overlay,
//! turns overlay intents into player operations and reacts to app lifecycle and
//! orientation signals. Everything the owning application needs to know comes
//! out as [`ScreenEvent`]s.

use crate::{
    config::ScreenConfig,
    engine::{EngineEvent, EngineSignals, MediaEngine},
    layer::{PlayerEvent, PlayerLayer, SeekCompletion},
    overlay::{ControlOverlay, OverlayAction, OverlayButton, OverlaySnapshot},
    timer::earliest,
    types::*,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Events for the application owning the screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreenEvent {
    Player { event: PlayerEvent },
    OverlayChanged { overlay: OverlaySnapshot },
    PeriodSelected { index: usize, length_secs: f64 },
    Favourite,
    Closed,
    /// The session entered the error state; presentation is up to the owner
    Failed { code: String, message: String },
}

/// Input from the host application or the user
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenInput {
    SetResource { resource: Resource, index: usize },
    SelectSource(usize),
    Seek(f64),
    Button(OverlayButton),
    Tap,
    Scrub(f64),
    SelectPeriod(usize),
    Orientation(Orientation),
    Lifecycle(AppLifecycle),
    Layout(Rect),
    Close,
}

pub struct Screen<E: MediaEngine> {
    config: ScreenConfig,
    layer: PlayerLayer<E>,
    overlay: ControlOverlay,
    resource: Option<Resource>,
    selected_index: usize,
    last_snapshot: Option<OverlaySnapshot>,
    outbox: Vec<ScreenEvent>,
    closed: bool,
}

impl<E: MediaEngine> Screen<E> {
    pub fn new(engine: E, config: ScreenConfig) -> Result<(Self, EngineSignals)> {
        config.validate()?;
        let (layer, signals) = PlayerLayer::new(engine, config.player.clone());
        let mut overlay = ControlOverlay::new(config.overlay.clone());
        overlay.sync_rate(layer.rate());

        let screen = Self {
            config,
            layer,
            overlay,
            resource: None,
            selected_index: 0,
            last_snapshot: None,
            outbox: Vec::new(),
            closed: false,
        };
        Ok((screen, signals))
    }

    pub fn layer(&self) -> &PlayerLayer<E> {
        &self.layer
    }

    pub fn overlay(&self) -> &ControlOverlay {
        &self.overlay
    }

    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn drain_events(&mut self) -> Vec<ScreenEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.closed {
            return None;
        }
        earliest(self.layer.next_deadline(), self.overlay.next_deadline())
    }

    /// Show `resource` and load its source at `index`
    #[instrument(skip(self, resource, now), fields(name = resource.display_name()))]
    pub fn set_resource(&mut self, resource: Resource, index: usize, now: Instant) -> Result<()> {
        self.ensure_open()?;
        let source = resource.source(index)?.clone();

        info!(index, "Setting resource");
        self.overlay.prepare(&resource, index, now);
        self.resource = Some(resource);
        self.selected_index = index;
        self.layer.load_source(&source, now);
        if self.config.should_auto_play {
            self.layer.play(now);
        }
        self.route(now);
        Ok(())
    }

    /// Switch to another source of the current resource, keeping the position
    pub fn select_source(&mut self, index: usize, now: Instant) -> Result<()> {
        self.ensure_open()?;
        let resource = self.resource.clone().ok_or(Error::NoSession)?;
        let source = resource.source(index)?.clone();

        let position = self.layer.current_time().unwrap_or(0.0);
        let was_playing = self.layer.is_playing();
        info!(index, position, "Switching source");

        self.overlay.prepare(&resource, index, now);
        self.selected_index = index;
        self.layer.load_source(&source, now);
        if position > 0.0 {
            self.layer.seek(position, None, now);
        }
        if was_playing {
            self.layer.play(now);
        }
        self.route(now);
        Ok(())
    }

    pub fn play(&mut self, now: Instant) {
        if self.layer.state() == PlaybackState::PlayedToEnd {
            self.replay(now);
        } else {
            self.layer.play(now);
        }
        self.route(now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.layer.pause();
        self.route(now);
    }

    pub fn seek(&mut self, to: f64, completion: Option<SeekCompletion>, now: Instant) {
        self.layer.seek(to, completion, now);
        self.route(now);
    }

    pub fn press(&mut self, button: OverlayButton, now: Instant) -> Result<()> {
        self.ensure_open()?;
        let action = self.overlay.press(button, now);
        self.apply(action, now)
    }

    pub fn tap(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        self.overlay.tap(now);
        self.route(now);
    }

    pub fn scrub(&mut self, to: f64, now: Instant) -> Result<()> {
        self.ensure_open()?;
        let action = self.overlay.scrub(to, now);
        self.apply(action, now)
    }

    pub fn select_period(&mut self, index: usize, now: Instant) -> Result<()> {
        self.ensure_open()?;
        let action = self.overlay.select_period(index, now);
        self.apply(action, now)
    }

    /// Orientation only reflows the layout
    pub fn on_orientation(&mut self, orientation: Orientation, now: Instant) {
        if self.closed {
            return;
        }
        self.overlay.on_orientation(orientation);
        self.route(now);
    }

    pub fn on_lifecycle(&mut self, lifecycle: AppLifecycle, now: Instant) {
        match lifecycle {
            AppLifecycle::DidEnterBackground => {
                self.layer.pause();
                self.layer.enter_background();
            }
            AppLifecycle::WillEnterForeground => self.layer.enter_foreground(),
        }
        self.route(now);
    }

    pub fn layout(&mut self, bounds: Rect) {
        self.layer.layout(bounds);
    }

    pub fn handle_signal(&mut self, event: EngineEvent, now: Instant) {
        self.layer.handle_signal(event, now);
        self.route(now);
    }

    pub fn pump(&mut self, signals: &mut EngineSignals, now: Instant) -> usize {
        let handled = self.layer.pump(signals, now);
        self.route(now);
        handled
    }

    pub fn on_timer(&mut self, now: Instant) {
        self.layer.on_timer(now);
        self.overlay.on_timer(now);
        self.route(now);
    }

    pub fn handle_input(&mut self, input: ScreenInput, now: Instant) -> Result<()> {
        match input {
            ScreenInput::SetResource { resource, index } => self.set_resource(resource, index, now),
            ScreenInput::SelectSource(index) => self.select_source(index, now),
            ScreenInput::Seek(to) if !to.is_finite() => Err(Error::InvalidSeek(to)),
            ScreenInput::Seek(to) => {
                self.seek(to, None, now);
                Ok(())
            }
            ScreenInput::Button(button) => self.press(button, now),
            ScreenInput::Tap => {
                self.tap(now);
                Ok(())
            }
            ScreenInput::Scrub(to) => self.scrub(to, now),
            ScreenInput::SelectPeriod(index) => self.select_period(index, now),
            ScreenInput::Orientation(orientation) => {
                self.on_orientation(orientation, now);
                Ok(())
            }
            ScreenInput::Lifecycle(lifecycle) => {
                self.on_lifecycle(lifecycle, now);
                Ok(())
            }
            ScreenInput::Layout(bounds) => {
                self.layout(bounds);
                Ok(())
            }
            ScreenInput::Close => {
                self.close();
                Ok(())
            }
        }
    }

    /// Dispose the player and the overlay. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        info!("Closing screen");
        self.layer.dispose();
        self.overlay.dispose();
        self.closed = true;
        self.outbox.push(ScreenEvent::Closed);
    }

    fn apply(&mut self, action: Option<OverlayAction>, now: Instant) -> Result<()> {
        let Some(action) = action else {
            self.route(now);
            return Ok(());
        };

        match action {
            OverlayAction::Play => self.play(now),
            OverlayAction::Pause => self.pause(now),
            OverlayAction::Close => self.close(),
            OverlayAction::Favourite => self.outbox.push(ScreenEvent::Favourite),
            OverlayAction::SetMuted { muted } => self.layer.set_muted(muted),
            OverlayAction::ChangeRate { rate } => self.layer.set_rate(rate)?,
            OverlayAction::Scrub { to } => self.layer.seek(to, None, now),
            OverlayAction::SelectPeriod { index, length_secs } => self
                .outbox
                .push(ScreenEvent::PeriodSelected { index, length_secs }),
        }
        self.route(now);
        Ok(())
    }

    /// Leave the played-to-end state by loading the current source again
    fn replay(&mut self, now: Instant) {
        let Some(source) = self
            .resource
            .as_ref()
            .and_then(|r| r.source(self.selected_index).ok())
            .cloned()
        else {
            return;
        };
        info!(locator = %source.locator, "Replaying");
        self.layer.load_source(&source, now);
        self.layer.play(now);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }

    /// Feed player callbacks to the overlay and publish what changed
    fn route(&mut self, now: Instant) {
        for event in self.layer.drain_events() {
            match &event {
                PlayerEvent::StateChanged { state } => {
                    self.overlay.on_state(*state, now);
                    if *state == PlaybackState::Error {
                        let (code, message) = match self.layer.last_error() {
                            Some(err) => (err.error_code().to_string(), err.to_string()),
                            None => ("PLAYBACK".to_string(), "playback failed".to_string()),
                        };
                        warn!(%code, %message, "Playback failed");
                        self.outbox.push(ScreenEvent::Player { event: event.clone() });
                        self.outbox.push(ScreenEvent::Failed { code, message });
                        continue;
                    }
                }
                PlayerEvent::IsPlayingChanged { playing } => {
                    self.overlay.on_playing_changed(*playing, now)
                }
                PlayerEvent::PlayTimeChanged { current, total } => {
                    self.overlay.on_play_time(*current, *total)
                }
                PlayerEvent::LoadedTimeChanged { loaded, total } => {
                    self.overlay.on_loaded_time(*loaded, *total)
                }
                PlayerEvent::BufferingRetry { .. } => {}
            }
            self.outbox.push(ScreenEvent::Player { event });
        }

        let snapshot = self.overlay.snapshot();
        if self.last_snapshot.as_ref() != Some(&snapshot) {
            self.last_snapshot = Some(snapshot.clone());
            self.outbox.push(ScreenEvent::OverlayChanged { overlay: snapshot });
        }
    }
}
