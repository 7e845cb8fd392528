//! Per-session configuration
//!
//! Every knob the player, the overlay and the screen read lives in one of the
//! structs below. They are passed in at construction time and never mutated
//! behind the owner's back.

use crate::{types::AspectRatio, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Player-layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Interval of the position/buffering poll
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    /// Cool-down before re-checking an empty buffer
    #[serde(with = "duration_secs")]
    pub buffering_retry_delay: Duration,
    /// Give up re-checking after this many attempts (None = keep retrying)
    pub max_buffering_retries: Option<u32>,
    /// Forced aspect ratio of the render surface
    pub aspect_ratio: AspectRatio,
    /// Initial playback rate
    pub playback_rate: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            buffering_retry_delay: Duration::from_secs(1),
            max_buffering_retries: None,
            aspect_ratio: AspectRatio::Default,
            playback_rate: 1.0,
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig("poll_interval must be positive".into()));
        }
        if self.buffering_retry_delay.is_zero() {
            return Err(Error::InvalidConfig(
                "buffering_retry_delay must be positive".into(),
            ));
        }
        if !(self.playback_rate.is_finite() && self.playback_rate > 0.0) {
            return Err(Error::InvalidRate(self.playback_rate));
        }
        Ok(())
    }
}

/// Live streams show a "live" badge; archives get a scrubber and period picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoKind {
    Live,
    #[default]
    Archive,
}

/// Control overlay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Countdown before chrome hides itself
    #[serde(with = "duration_secs")]
    pub auto_hide_delay: Duration,
    /// Also hide while media is actively playing, not only when idle
    pub auto_hide_while_playing: bool,
    pub video_kind: VideoKind,
    /// Rates the speed buttons step through, ascending
    pub playback_rates: Vec<f32>,
    /// Entries of the archive period picker
    #[serde(with = "duration_secs_vec")]
    pub periods: Vec<Duration>,
    pub tint_color: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            auto_hide_delay: Duration::from_secs(5),
            auto_hide_while_playing: false,
            video_kind: VideoKind::Archive,
            playback_rates: vec![0.5, 1.0, 1.25, 1.5, 2.0],
            periods: vec![
                Duration::from_secs(15 * 60),
                Duration::from_secs(30 * 60),
                Duration::from_secs(60 * 60),
                Duration::from_secs(3 * 60 * 60),
            ],
            tint_color: "#ffffff".to_string(),
        }
    }
}

impl OverlayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.playback_rates.is_empty() {
            return Err(Error::InvalidConfig("playback_rates must not be empty".into()));
        }
        if let Some(rate) = self
            .playback_rates
            .iter()
            .find(|r| !(r.is_finite() && **r > 0.0))
        {
            return Err(Error::InvalidRate(*rate));
        }
        if self.playback_rates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidConfig(
                "playback_rates must be strictly ascending".into(),
            ));
        }
        if !self.tint_color.starts_with('#') {
            return Err(Error::InvalidConfig(format!(
                "tint_color must be a hex color, got {}",
                self.tint_color
            )));
        }
        Ok(())
    }
}

/// Screen configuration: owns the other two
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Start playing as soon as a resource is set
    pub should_auto_play: bool,
    pub player: PlayerConfig,
    pub overlay: OverlayConfig,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            should_auto_play: true,
            player: PlayerConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl ScreenConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.player.validate()?;
        self.overlay.validate()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod duration_secs_vec {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value.iter().map(Duration::as_secs_f64))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Duration>, D::Error> {
        Vec::<f64>::deserialize(deserializer)?
            .into_iter()
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .collect()
    }
}
