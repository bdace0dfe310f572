//! Minimum spacing between calls to a rate-limited service.

use std::time::{Duration, Instant};

/// Enforces a minimum interval between the end of one call and the start
/// of the next.
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleep until the interval since the previous call has elapsed, run
    /// `call`, then record its completion time.
    pub fn pace<T>(&mut self, call: impl FnOnce() -> T) -> T {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        let result = call();
        self.last_call = Some(Instant::now());
        result
    }
}
