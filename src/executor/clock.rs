use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Monotonic run clock anchored at the start of the ramp. Backed by tokio's
/// clock so paused-time tests drive it.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    start: Instant,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Sleeps until `offset` after the start; returns at once if already past.
    pub async fn sleep_until(&self, offset: Duration) {
        sleep_until(self.start + offset).await;
    }
}
