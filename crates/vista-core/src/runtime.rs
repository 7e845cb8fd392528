//! Runtime - drives a [`Screen`] on a single task
//!
//! Engine signals, user input and every timer deadline are serialised through
//! one `select!` loop, so the screen and its player are only ever touched from
//! that task.

use crate::{
    engine::{EngineSignals, MediaEngine},
    overlay::OverlayButton,
    screen::{Screen, ScreenEvent, ScreenInput},
    types::{AppLifecycle, Orientation, Resource},
    Error, Result,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Cloneable sender of [`ScreenInput`]s. Dropping every handle closes the screen.
#[derive(Debug, Clone)]
pub struct ScreenHandle {
    tx: mpsc::UnboundedSender<ScreenInput>,
}

impl ScreenHandle {
    pub fn send(&self, input: ScreenInput) -> Result<()> {
        self.tx.send(input).map_err(|_| Error::Disposed)
    }

    pub fn set_resource(&self, resource: Resource, index: usize) -> Result<()> {
        self.send(ScreenInput::SetResource { resource, index })
    }

    pub fn seek(&self, to: f64) -> Result<()> {
        self.send(ScreenInput::Seek(to))
    }

    pub fn press(&self, button: OverlayButton) -> Result<()> {
        self.send(ScreenInput::Button(button))
    }

    pub fn tap(&self) -> Result<()> {
        self.send(ScreenInput::Tap)
    }

    pub fn orientation(&self, orientation: Orientation) -> Result<()> {
        self.send(ScreenInput::Orientation(orientation))
    }

    pub fn lifecycle(&self, lifecycle: AppLifecycle) -> Result<()> {
        self.send(ScreenInput::Lifecycle(lifecycle))
    }

    pub fn close(&self) -> Result<()> {
        self.send(ScreenInput::Close)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct ScreenRuntime;

impl ScreenRuntime {
    /// Move `screen` onto its own task
    pub fn spawn<E>(
        screen: Screen<E>,
        signals: EngineSignals,
    ) -> (
        ScreenHandle,
        mpsc::UnboundedReceiver<ScreenEvent>,
        JoinHandle<()>,
    )
    where
        E: MediaEngine + 'static,
    {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(screen, signals, input_rx, event_tx));
        (ScreenHandle { tx: input_tx }, event_rx, task)
    }
}

async fn run<E: MediaEngine>(
    mut screen: Screen<E>,
    mut signals: EngineSignals,
    mut inputs: mpsc::UnboundedReceiver<ScreenInput>,
    events: mpsc::UnboundedSender<ScreenEvent>,
) {
    info!("Screen runtime started");
    loop {
        publish(&mut screen, &events);
        if screen.is_closed() {
            break;
        }

        let deadline = screen.next_deadline();
        // only polled when `deadline` is set
        let idle = Instant::now() + Duration::from_secs(3600);

        tokio::select! {
            input = inputs.recv() => match input {
                Some(input) => {
                    if let Err(err) = screen.handle_input(input, Instant::now()) {
                        warn!(error = %err, code = err.error_code(), "Input rejected");
                    }
                }
                None => {
                    debug!("All handles dropped");
                    screen.close();
                }
            },
            Some(event) = signals.recv() => screen.handle_signal(event, Instant::now()),
            _ = sleep_until(deadline.unwrap_or(idle)), if deadline.is_some() => {
                screen.on_timer(Instant::now());
            }
        }
    }
    publish(&mut screen, &events);
    info!("Screen runtime stopped");
}

fn publish<E: MediaEngine>(screen: &mut Screen<E>, events: &mpsc::UnboundedSender<ScreenEvent>) {
    for event in screen.drain_events() {
        if events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}
