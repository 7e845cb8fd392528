//! Vista Core - playback state reconciliation for a video player component
//!
//! This crate provides the logic between a platform media engine and the
//! playback chrome drawn on top of it:
//! - Translation of engine signals into a small playback state machine
//! - Deferred seeks, position polling and buffering retry
//! - Control overlay presentation state (loader, auto-hide, speed, scrubber)
//! - A screen that composes both and reacts to lifecycle/orientation changes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Vista Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ┌──────────────┐   signals    ┌──────────────┐                │
//! │   │ MediaEngine  │ ───────────▶ │ PlayerLayer  │                │
//! │   │  (platform)  │ ◀─────────── │  (reconcile) │                │
//! │   └──────────────┘  play/seek   └──────┬───────┘                │
//! │                                        │ PlayerEvent            │
//! │                                 ┌──────┴───────┐                │
//! │   ┌──────────────┐   actions    │    Screen    │  ScreenEvent   │
//! │   │ControlOverlay│ ───────────▶ │              │ ─────────────▶ │
//! │   │              │ ◀─────────── │              │                │
//! │   └──────────────┘    state     └──────┬───────┘                │
//! │                                        │                        │
//! │                                 ┌──────┴───────┐                │
//! │                                 │ScreenRuntime │                │
//! │                                 │ (one task)   │                │
//! │                                 └──────────────┘                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod layer;
pub mod overlay;
pub mod runtime;
pub mod screen;
pub mod sim;
pub mod timer;
pub mod types;

pub use config::{OverlayConfig, PlayerConfig, ScreenConfig, VideoKind};
pub use engine::{EngineSignal, EngineSignals, EventSink, MediaEngine, SeekTicket};
pub use error::{Error, Result};
pub use layer::{PlayerEvent, PlayerLayer, SeekCompletion};
pub use overlay::{ControlOverlay, OverlayAction, OverlayButton, OverlaySnapshot};
pub use runtime::{ScreenHandle, ScreenRuntime};
pub use screen::{Screen, ScreenEvent, ScreenInput};
pub use sim::{SimController, SimulatedEngine};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version once at startup
pub fn init() {
    tracing::info!(version = VERSION, "Vista Core initialized");
}
