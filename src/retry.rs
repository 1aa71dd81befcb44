//! Bounded retry with jittered delay
//!
//! The host reports player and stream state lazily; a query right after a
//! playback event often returns nothing for a second or two. All such fetches
//! share this one retry discipline instead of scattering sleep loops.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::shutdown::Shutdown;

/// Bounded retry policy with jittered inter-attempt delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Fractional jitter applied to `base_delay` (0.2 = +/-20%).
    pub jitter: f64,
    /// Floor for the jittered delay.
    pub min_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            jitter: 0.2,
            min_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it yields a value or the attempt budget is exhausted.
    /// Waits between attempts are abort-aware; a shutdown request ends the
    /// loop early with `None`.
    pub fn run<T>(
        &self,
        shutdown: &Shutdown,
        what: &str,
        mut op: impl FnMut() -> Option<T>,
    ) -> Option<T> {
        for attempt in 1..=self.max_attempts {
            if let Some(value) = op() {
                return Some(value);
            }
            debug!(
                "{what}: no result, retrying ({attempt}/{})",
                self.max_attempts
            );
            if attempt < self.max_attempts && shutdown.wait_timeout(self.jittered_delay()) {
                return None;
            }
        }
        warn!("{what}: giving up after {} attempts", self.max_attempts);
        None
    }

    fn jittered_delay(&self) -> Duration {
        let spread = if self.jitter > 0.0 {
            (1.0 - self.jitter) + rand::thread_rng().gen_range(0.0..(2.0 * self.jitter))
        } else {
            1.0
        };
        let delay = self.base_delay.as_secs_f64() * spread;
        Duration::from_secs_f64(delay.max(self.min_delay.as_secs_f64()))
    }
}
