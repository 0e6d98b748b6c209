use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time source and delay primitive supplied by the host.
///
/// `monotonic` is measured from an arbitrary origin fixed for the lifetime of
/// the clock; only differences between two readings are meaningful.
pub trait Clock: Send + Sync {
    fn monotonic(&self) -> Duration;
    /// Wall-clock time since the Unix epoch, at the best precision available.
    fn wall(&self) -> Duration;
    fn sleep(&self, duration: Duration);

    fn wall_unix_millis(&self) -> u64 {
        self.wall().as_millis() as u64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
