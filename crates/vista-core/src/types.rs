//! Core types for Vista

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a locator is going to be opened by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Local file
    File,
    /// HLS playlist
    Hls,
    /// Plain remote media file
    Progressive,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::File => write!(f, "file"),
            SourceKind::Hls => write!(f, "hls"),
            SourceKind::Progressive => write!(f, "progressive"),
        }
    }
}

/// A playable source and the options the engine should open it with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Where the stream lives
    pub locator: Url,
    /// Engine-specific load options, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_options: Option<BTreeMap<String, serde_json::Value>>,
}

impl SourceDescriptor {
    pub fn new(locator: Url) -> Self {
        Self {
            locator,
            playback_options: None,
        }
    }

    pub fn parse(locator: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(locator)?))
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.playback_options
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> SourceKind {
        if self.locator.scheme() == "file" {
            return SourceKind::File;
        }
        let path = self.locator.path().to_ascii_lowercase();
        if path.ends_with(".m3u8") {
            SourceKind::Hls
        } else {
            SourceKind::Progressive
        }
    }
}

/// A playable item: one or more sources, a preview image and a display name.
///
/// Sources are never empty; the struct is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    sources: Vec<SourceDescriptor>,
    preview_image: Url,
    display_name: String,
}

impl Resource {
    pub fn new(
        sources: Vec<SourceDescriptor>,
        preview_image: Url,
        display_name: impl Into<String>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::EmptyResource);
        }
        Ok(Self {
            sources,
            preview_image,
            display_name: display_name.into(),
        })
    }

    /// Resource with a single source and no load options
    pub fn single(locator: Url, preview_image: Url, display_name: impl Into<String>) -> Self {
        Self {
            sources: vec![SourceDescriptor::new(locator)],
            preview_image,
            display_name: display_name.into(),
        }
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn source(&self, index: usize) -> Result<&SourceDescriptor> {
        self.sources.get(index).ok_or(Error::SourceIndexOutOfRange {
            index,
            len: self.sources.len(),
        })
    }

    pub fn preview_image(&self) -> &Url {
        &self.preview_image
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Lifecycle state of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No source has been loaded yet
    #[default]
    NotSet,
    /// Item is ready and any queued seek has been applied
    ReadyToPlay,
    /// Waiting for data
    Buffering,
    /// Enough data to keep playing
    BufferFinished,
    /// Reached the end of the item
    PlayedToEnd,
    /// The engine reported a failure
    Error,
}

impl PlaybackState {
    /// Check if transition to new state is valid
    pub fn can_transition_to(&self, next: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, next),
            (NotSet, Buffering)
                | (NotSet, Error)
                | (Buffering, ReadyToPlay)
                | (Buffering, BufferFinished)
                | (Buffering, PlayedToEnd)
                | (Buffering, Error)
                | (ReadyToPlay, Buffering)
                | (ReadyToPlay, BufferFinished)
                | (ReadyToPlay, PlayedToEnd)
                | (ReadyToPlay, Error)
                | (BufferFinished, Buffering)
                | (BufferFinished, PlayedToEnd)
                | (BufferFinished, Error)
        )
    }

    /// Only a new load leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::PlayedToEnd | PlaybackState::Error)
    }

    /// States in which the loading indicator is shown
    pub fn is_loading(&self) -> bool {
        matches!(self, PlaybackState::NotSet | PlaybackState::Buffering)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::NotSet => write!(f, "not_set"),
            PlaybackState::ReadyToPlay => write!(f, "ready_to_play"),
            PlaybackState::Buffering => write!(f, "buffering"),
            PlaybackState::BufferFinished => write!(f, "buffer_finished"),
            PlaybackState::PlayedToEnd => write!(f, "played_to_end"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

/// A loaded range of the timeline, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Axis-aligned rectangle in container points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn with_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// How video content is fitted into the render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoGravity {
    /// Preserve aspect, fit inside the surface
    ResizeAspect,
    /// Stretch to fill the surface
    Resize,
}

/// Forced aspect ratio for the render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// Use the video's own aspect ratio
    #[default]
    Default,
    /// 16:9
    SixteenNine,
    /// 4:3
    FourThree,
}

/// Where and how the render surface is drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceLayout {
    pub frame: Rect,
    pub gravity: VideoGravity,
}

impl AspectRatio {
    /// Compute the surface frame inside `bounds`
    pub fn layout(&self, bounds: Rect) -> SurfaceLayout {
        match self {
            AspectRatio::Default => SurfaceLayout {
                frame: bounds,
                gravity: VideoGravity::ResizeAspect,
            },
            AspectRatio::SixteenNine => SurfaceLayout {
                frame: Rect::new(0.0, 0.0, bounds.width, bounds.width / (16.0 / 9.0)),
                gravity: VideoGravity::Resize,
            },
            AspectRatio::FourThree => {
                let width = bounds.height * 4.0 / 3.0;
                SurfaceLayout {
                    frame: Rect::new((bounds.width - width) / 2.0, 0.0, width, bounds.height),
                    gravity: VideoGravity::Resize,
                }
            }
        }
    }
}

/// Physical device orientation as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
    Unknown,
}

/// Host application lifecycle signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppLifecycle {
    DidEnterBackground,
    WillEnterForeground,
}
