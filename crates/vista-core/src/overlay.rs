//! Control overlay - presentation state of the playback chrome
//!
//! Driven by the playback state, the playing flag and time callbacks. User
//! gestures come back out as [`OverlayAction`]s for the screen to act on.

use crate::{
    config::{OverlayConfig, VideoKind},
    timer::Countdown,
    types::{Orientation, PlaybackState, Resource},
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Buttons on the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayButton {
    Play,
    Pause,
    Close,
    Favourite,
    SoundToggle,
    SpeedUp,
    SpeedDown,
}

/// A user intent forwarded to the screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OverlayAction {
    Play,
    Pause,
    Close,
    Favourite,
    SetMuted { muted: bool },
    ChangeRate { rate: f32 },
    Scrub { to: f64 },
    SelectPeriod { index: usize, length_secs: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Portrait,
    Landscape,
}

/// Scrubber position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scrubber {
    pub current: f64,
    pub total: f64,
    pub loaded: f64,
}

/// Everything a renderer needs to draw the overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySnapshot {
    pub title: String,
    pub selected_index: usize,
    pub is_showing: bool,
    pub loader_visible: bool,
    pub preview_image: Option<Url>,
    pub preview_visible: bool,
    pub play_button_selected: bool,
    pub sound_on: bool,
    pub rate: f32,
    pub layout: LayoutMode,
    pub live_badge: bool,
    pub scrubber: Option<Scrubber>,
    pub selected_period: Option<usize>,
    pub tint_color: String,
}

pub struct ControlOverlay {
    config: OverlayConfig,
    title: String,
    selected_index: usize,
    preview_image: Option<Url>,
    preview_visible: bool,
    is_showing: bool,
    loader_visible: bool,
    last_state: PlaybackState,
    is_playing: bool,
    sound_on: bool,
    rate_index: usize,
    selected_period: Option<usize>,
    current: f64,
    total: f64,
    loaded: f64,
    layout: LayoutMode,
    auto_hide: Countdown,
}

impl ControlOverlay {
    pub fn new(config: OverlayConfig) -> Self {
        let rate_index = nearest_rate_index(&config.playback_rates, 1.0);
        Self {
            config,
            title: String::new(),
            selected_index: 0,
            preview_image: None,
            preview_visible: false,
            is_showing: true,
            loader_visible: false,
            last_state: PlaybackState::NotSet,
            is_playing: false,
            sound_on: true,
            rate_index,
            selected_period: None,
            current: 0.0,
            total: 0.0,
            loaded: 0.0,
            layout: LayoutMode::Portrait,
            auto_hide: Countdown::new(),
        }
    }

    pub fn is_showing(&self) -> bool {
        self.is_showing
    }

    pub fn is_loader_visible(&self) -> bool {
        self.loader_visible
    }

    pub fn last_state(&self) -> PlaybackState {
        self.last_state
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    /// Falls back to normal speed when the ladder is empty
    pub fn rate(&self) -> f32 {
        self.config
            .playback_rates
            .get(self.rate_index)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.auto_hide.deadline()
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        let archive = self.config.video_kind == VideoKind::Archive;
        OverlaySnapshot {
            title: self.title.clone(),
            selected_index: self.selected_index,
            is_showing: self.is_showing,
            loader_visible: self.loader_visible,
            preview_image: self.preview_image.clone(),
            preview_visible: self.preview_visible,
            play_button_selected: self.is_playing,
            sound_on: self.sound_on,
            rate: self.rate(),
            layout: self.layout,
            live_badge: !archive,
            scrubber: archive.then_some(Scrubber {
                current: self.current,
                total: self.total,
                loaded: self.loaded,
            }),
            selected_period: self.selected_period.filter(|_| archive),
            tint_color: self.config.tint_color.clone(),
        }
    }

    /// Show a new resource
    pub fn prepare(&mut self, resource: &Resource, selected_index: usize, now: Instant) {
        self.title = resource.display_name().to_string();
        self.selected_index = selected_index;
        self.preview_image = Some(resource.preview_image().clone());
        self.preview_visible = true;
        self.current = 0.0;
        self.total = 0.0;
        self.loaded = 0.0;
        self.schedule_auto_hide(now);
    }

    /// Keep the speed buttons in step with the player
    pub fn sync_rate(&mut self, rate: f32) {
        self.rate_index = nearest_rate_index(&self.config.playback_rates, rate);
    }

    pub fn on_state(&mut self, state: PlaybackState, now: Instant) {
        self.last_state = state;
        match state {
            PlaybackState::NotSet => {
                self.loader_visible = true;
                self.set_showing(true, now);
            }
            PlaybackState::Buffering => self.loader_visible = true,
            PlaybackState::ReadyToPlay | PlaybackState::BufferFinished => {
                self.loader_visible = false;
                self.preview_visible = false;
            }
            PlaybackState::PlayedToEnd => self.set_showing(true, now),
            PlaybackState::Error => {
                self.loader_visible = false;
                self.set_showing(true, now);
            }
        }
    }

    pub fn on_playing_changed(&mut self, playing: bool, now: Instant) {
        self.is_playing = playing;
        self.schedule_auto_hide(now);
    }

    pub fn on_play_time(&mut self, current: f64, total: f64) {
        self.current = current;
        self.total = total;
    }

    pub fn on_loaded_time(&mut self, loaded: f64, total: f64) {
        self.loaded = loaded;
        self.total = total;
    }

    /// Show or hide the chrome; repeated values are ignored
    pub fn set_showing(&mut self, showing: bool, now: Instant) {
        if self.is_showing == showing {
            return;
        }
        self.is_showing = showing;
        if showing {
            self.schedule_auto_hide(now);
        } else {
            self.auto_hide.cancel();
        }
    }

    /// Tap on the video area toggles the chrome, except after the end
    pub fn tap(&mut self, now: Instant) {
        if self.last_state == PlaybackState::PlayedToEnd {
            return;
        }
        self.set_showing(!self.is_showing, now);
    }

    /// Returns true if the layout changed
    pub fn on_orientation(&mut self, orientation: Orientation) -> bool {
        let next = match orientation {
            Orientation::Portrait => LayoutMode::Portrait,
            Orientation::LandscapeLeft | Orientation::LandscapeRight => LayoutMode::Landscape,
            _ => return false,
        };
        let changed = self.layout != next;
        self.layout = next;
        changed
    }

    pub fn press(&mut self, button: OverlayButton, now: Instant) -> Option<OverlayAction> {
        debug!(?button, "Overlay button pressed");
        if self.is_showing {
            self.schedule_auto_hide(now);
        }
        match button {
            OverlayButton::Play => Some(OverlayAction::Play),
            OverlayButton::Pause => Some(OverlayAction::Pause),
            OverlayButton::Close => Some(OverlayAction::Close),
            OverlayButton::Favourite => Some(OverlayAction::Favourite),
            OverlayButton::SoundToggle => {
                self.sound_on = !self.sound_on;
                Some(OverlayAction::SetMuted {
                    muted: !self.sound_on,
                })
            }
            OverlayButton::SpeedUp => {
                if self.rate_index + 1 >= self.config.playback_rates.len() {
                    return None;
                }
                self.rate_index += 1;
                Some(OverlayAction::ChangeRate { rate: self.rate() })
            }
            OverlayButton::SpeedDown => {
                if self.rate_index == 0 {
                    return None;
                }
                self.rate_index -= 1;
                Some(OverlayAction::ChangeRate { rate: self.rate() })
            }
        }
    }

    /// Drag on the scrubber. Archive only, and only once the total is known.
    pub fn scrub(&mut self, to: f64, now: Instant) -> Option<OverlayAction> {
        if self.config.video_kind != VideoKind::Archive || self.total <= 0.0 || !to.is_finite() {
            return None;
        }
        self.schedule_auto_hide(now);
        let to = to.clamp(0.0, self.total);
        self.current = to;
        Some(OverlayAction::Scrub { to })
    }

    /// Pick an entry of the archive period picker
    pub fn select_period(&mut self, index: usize, now: Instant) -> Option<OverlayAction> {
        if self.config.video_kind != VideoKind::Archive {
            return None;
        }
        let length = *self.config.periods.get(index)?;
        self.selected_period = Some(index);
        self.schedule_auto_hide(now);
        Some(OverlayAction::SelectPeriod {
            index,
            length_secs: length.as_secs_f64(),
        })
    }

    pub fn on_timer(&mut self, now: Instant) {
        if self.auto_hide.take_due(now) && self.should_auto_hide() {
            debug!("Auto-hiding overlay");
            self.set_showing(false, now);
        }
    }

    pub fn dispose(&mut self) {
        self.auto_hide.cancel();
    }

    fn should_auto_hide(&self) -> bool {
        self.last_state == PlaybackState::PlayedToEnd
            || (self.config.auto_hide_while_playing && self.is_playing)
    }

    fn schedule_auto_hide(&mut self, now: Instant) {
        self.auto_hide.schedule(now, self.config.auto_hide_delay);
    }
}

fn nearest_rate_index(rates: &[f32], rate: f32) -> usize {
    rates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - rate).abs().total_cmp(&(*b - rate).abs()))
        .map(|(index, _)| index)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn resource() -> Resource {
        Resource::single(
            Url::parse("https://cdn.example.com/a.mp4").unwrap(),
            Url::parse("https://img.example.com/a.jpg").unwrap(),
            "Entrance",
        )
    }

    #[test]
    fn test_prepare_sets_title_and_preview() {
        let mut overlay = ControlOverlay::new(OverlayConfig::default());
        overlay.prepare(&resource(), 0, Instant::now());
        let snapshot = overlay.snapshot();
        assert_eq!(snapshot.title, "Entrance");
        assert!(snapshot.preview_visible);
        assert_eq!(snapshot.rate, 1.0);

        overlay.on_state(PlaybackState::ReadyToPlay, Instant::now());
        assert!(!overlay.snapshot().preview_visible);
    }

    #[test]
    fn test_loader_follows_state() {
        let mut overlay = ControlOverlay::new(OverlayConfig::default());
        let now = Instant::now();
        overlay.on_state(PlaybackState::Buffering, now);
        assert!(overlay.is_loader_visible());
        overlay.on_state(PlaybackState::BufferFinished, now);
        assert!(!overlay.is_loader_visible());
    }

    #[test]
    fn test_auto_hide_only_when_idle() {
        let mut overlay = ControlOverlay::new(OverlayConfig::default());
        let now = Instant::now();
        overlay.on_state(PlaybackState::ReadyToPlay, now);
        overlay.on_playing_changed(true, now);
        overlay.on_timer(now + Duration::from_secs(5));
        assert!(overlay.is_showing());

        overlay.on_state(PlaybackState::PlayedToEnd, now);
        overlay.on_playing_changed(false, now);
        overlay.on_timer(now + Duration::from_secs(4));
        assert!(overlay.is_showing());
        overlay.on_timer(now + Duration::from_secs(5));
        assert!(!overlay.is_showing());
    }

    #[test]
    fn test_show_request_reschedules_countdown() {
        let config = OverlayConfig {
            auto_hide_while_playing: true,
            ..Default::default()
        };
        let mut overlay = ControlOverlay::new(config);
        let now = Instant::now();
        overlay.on_playing_changed(true, now);

        overlay.press(OverlayButton::Favourite, now + Duration::from_secs(3));
        overlay.on_timer(now + Duration::from_secs(5));
        assert!(overlay.is_showing());
        overlay.on_timer(now + Duration::from_secs(8));
        assert!(!overlay.is_showing());
        assert!(overlay.next_deadline().is_none());
    }

    #[test]
    fn test_tap_ignored_after_end() {
        let mut overlay = ControlOverlay::new(OverlayConfig::default());
        let now = Instant::now();
        overlay.tap(now);
        assert!(!overlay.is_showing());
        overlay.tap(now);
        assert!(overlay.is_showing());

        overlay.on_state(PlaybackState::PlayedToEnd, now);
        overlay.tap(now);
        assert!(overlay.is_showing());
    }

    #[test]
    fn test_orientation_layout() {
        let mut overlay = ControlOverlay::new(OverlayConfig::default());
        assert!(overlay.on_orientation(Orientation::LandscapeLeft));
        assert!(!overlay.on_orientation(Orientation::FaceUp));
        assert_eq!(overlay.layout(), LayoutMode::Landscape);
        assert!(overlay.on_orientation(Orientation::Portrait));
    }

    #[test]
    fn test_speed_buttons_walk_the_ladder() {
        let mut overlay = ControlOverlay::new(OverlayConfig::default());
        let now = Instant::now();
        assert_eq!(
            overlay.press(OverlayButton::SpeedUp, now),
            Some(OverlayAction::ChangeRate { rate: 1.25 })
        );
        overlay.press(OverlayButton::SpeedUp, now);
        overlay.press(OverlayButton::SpeedUp, now);
        assert_eq!(overlay.press(OverlayButton::SpeedUp, now), None);
        assert_eq!(overlay.rate(), 2.0);

        overlay.sync_rate(0.6);
        assert_eq!(overlay.press(OverlayButton::SpeedDown, now), None);
    }

    #[test]
    fn test_empty_rate_ladder() {
        let mut overlay = ControlOverlay::new(OverlayConfig {
            playback_rates: Vec::new(),
            ..Default::default()
        });
        let now = Instant::now();
        assert_eq!(overlay.snapshot().rate, 1.0);
        assert_eq!(overlay.press(OverlayButton::SpeedUp, now), None);
        assert_eq!(overlay.press(OverlayButton::SpeedDown, now), None);
    }

    #[test]
    fn test_sound_toggle() {
        let mut overlay = ControlOverlay::new(OverlayConfig::default());
        let now = Instant::now();
        assert_eq!(
            overlay.press(OverlayButton::SoundToggle, now),
            Some(OverlayAction::SetMuted { muted: true })
        );
        assert!(!overlay.snapshot().sound_on);
    }

    #[test]
    fn test_scrub_and_periods_are_archive_only() {
        let mut archive = ControlOverlay::new(OverlayConfig::default());
        let now = Instant::now();
        assert_eq!(archive.scrub(10.0, now), None);
        archive.on_play_time(5.0, 60.0);
        assert_eq!(archive.scrub(90.0, now), Some(OverlayAction::Scrub { to: 60.0 }));
        assert_eq!(
            archive.select_period(1, now),
            Some(OverlayAction::SelectPeriod {
                index: 1,
                length_secs: 1800.0
            })
        );
        assert_eq!(archive.select_period(9, now), None);

        let mut live = ControlOverlay::new(OverlayConfig {
            video_kind: VideoKind::Live,
            ..Default::default()
        });
        live.on_play_time(5.0, 60.0);
        assert_eq!(live.scrub(10.0, now), None);
        assert_eq!(live.select_period(0, now), None);
        let snapshot = live.snapshot();
        assert!(snapshot.live_badge);
        assert!(snapshot.scrubber.is_none());
    }
}
