//! Abort-aware shutdown signal
//!
//! Every background wait in the crate goes through [`Shutdown::wait_timeout`]
//! so that no worker can block process teardown. The primitive is a cloneable
//! condvar-backed flag: requesting shutdown wakes all waiters immediately.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Cloneable shutdown signal shared by all workers.
#[derive(Clone, Debug)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    requested: Mutex<bool>,
    cond: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                requested: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Request shutdown, waking every pending `wait_timeout`.
    pub fn request(&self) {
        let mut requested = self.inner.requested.lock().unwrap();
        *requested = true;
        self.inner.cond.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.inner.requested.lock().unwrap()
    }

    /// Wait up to `timeout`. Returns `true` if shutdown was requested before
    /// the timeout elapsed (mirrors the host monitor's wait-for-abort call).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut requested = self.inner.requested.lock().unwrap();
        while !*requested {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .cond
                .wait_timeout(requested, deadline - now)
                .unwrap();
            requested = guard;
        }
        true
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
