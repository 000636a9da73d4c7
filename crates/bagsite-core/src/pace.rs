//! Leading-edge throttle.
//!
//! Callers pass the current instant in, so the throttle never reads a clock
//! itself and tests stay deterministic.

use std::time::{Duration, Instant};

/// Default window, one animation frame at 60 Hz.
pub const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct Throttle {
    window: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit the call if at least `window` has passed since the last
    /// admitted one. The first call is always admitted.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.wait_time(now).is_zero() {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    /// Time left until the next call would be admitted.
    pub fn wait_time(&self, now: Instant) -> Duration {
        match self.last {
            None => Duration::ZERO,
            Some(last) => self
                .window
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(FRAME)
    }
}
