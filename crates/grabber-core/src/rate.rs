use std::time::{SystemTime, UNIX_EPOCH};

/// Source of capture timestamps, in seconds
pub trait Clock: Send {
    fn now(&self) -> f64;
}

/// Wall clock, seconds since the Unix epoch
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Instantaneous frames-per-second from consecutive capture timestamps.
///
/// The previous timestamp starts at zero, so the first value is meaningless.
/// Two captures at the same instant report `f64::INFINITY`.
#[derive(Debug, Default, Clone)]
pub struct RateTracker {
    previous: f64,
    fps: f64,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_at(&mut self, now: f64) -> f64 {
        let elapsed = now - self.previous;
        self.fps = if elapsed == 0.0 { f64::INFINITY } else { 1.0 / elapsed };
        self.previous = now;
        self.fps
    }

    pub fn tick(&mut self, clock: &dyn Clock) -> f64 {
        self.tick_at(clock.now())
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}
