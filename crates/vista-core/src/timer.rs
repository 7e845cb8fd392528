//! Timer bookkeeping
//!
//! Timers here never sleep themselves. They only remember when they are due;
//! whoever drives the player (the runtime actor, or a test) asks for the
//! earliest deadline, waits for it and then hands the current instant back.

use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of the repeating poll timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not scheduled
    Idle,
    /// Firing every interval
    Running,
    /// Kept alive but pushed out indefinitely
    Suspended,
}

/// Repeating timer that samples position and buffering state
#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    state: TimerState,
    next_fire: Option<Instant>,
    invalidations: u32,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: TimerState::Idle,
            next_fire: None,
            invalidations: 0,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Times a live (running or suspended) timer has been stopped
    pub fn invalidations(&self) -> u32 {
        self.invalidations
    }

    /// (Re)schedule with the first tick due immediately
    pub fn start(&mut self, now: Instant) {
        self.state = TimerState::Running;
        self.next_fire = Some(now);
    }

    /// Defer firing without tearing the timer down
    pub fn suspend(&mut self) {
        if self.state == TimerState::Running {
            self.state = TimerState::Suspended;
            self.next_fire = None;
        }
    }

    /// Stop the timer. Returns false if it was already idle.
    pub fn invalidate(&mut self) -> bool {
        if self.state == TimerState::Idle {
            return false;
        }
        self.state = TimerState::Idle;
        self.next_fire = None;
        self.invalidations += 1;
        true
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_fire
    }

    /// Consume a due tick and schedule the next one
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.next_fire {
            Some(at) if self.state == TimerState::Running && at <= now => {
                self.next_fire = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

/// One-shot deadline
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    at: Option<Instant>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule, replacing any pending deadline
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.at = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_pending(&self) -> bool {
        self.at.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.at
    }

    /// Returns true exactly once when the deadline has passed
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.at {
            Some(at) if at <= now => {
                self.at = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of two optional deadlines
pub fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
