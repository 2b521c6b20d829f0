// Time source for bounded waits (readiness polling, suite timeout)
use std::time::{Duration, Instant};

/// Lets readiness and timeout loops run against fake time in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock whose time only moves when something sleeps on it
#[derive(Debug, Clone)]
pub struct FakeClock {
    time: std::sync::Arc<std::sync::Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            time: std::sync::Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut time) = self.time.lock() {
            *time += duration;
        }
    }

    /// Total time elapsed since `origin` on this clock
    pub fn elapsed_since(&self, origin: Instant) -> Duration {
        self.now().duration_since(origin)
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.time
            .lock()
            .map(|time| *time)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
