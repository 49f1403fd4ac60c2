//! Bounded waits for ports shared across threads.
//!
//! When simulated units run on separate threads, a reader may have to wait
//! for its producer to catch up, and a writer for its consumer to drain a
//! row. These waits poll the storage with exponential backoff and always
//! end: either the condition holds, the deadline passes
//! ([`PortError::WaitTimedOut`]), or the caller's [`CancelToken`] fires
//! ([`PortError::WaitCancelled`]).

use crossbeam_utils::Backoff;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{PortError, PortResult};
use crate::types::Cycle;

/// Longest single sleep once spinning has been given up.
const MAX_PARK: Duration = Duration::from_millis(1);

/// A shared flag that interrupts pending waits.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupts every wait observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Re-arms the token.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Bounds of a remote wait.
#[derive(Clone, Debug)]
pub struct WaitOptions {
    timeout: Duration,
    spin_limit: u32,
    cancel: Option<CancelToken>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl WaitOptions {
    /// Creates options that give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            spin_limit: 6,
            cancel: None,
        }
    }

    /// Number of backoff steps before the waiter starts sleeping.
    pub fn with_spin_limit(mut self, spin_limit: u32) -> Self {
        self.spin_limit = spin_limit;
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn spin_limit(&self) -> u32 {
        self.spin_limit
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Polls `ready` until it returns true or the wait is bounded out.
pub(crate) fn wait_until(
    port: &str,
    cycle: Cycle,
    options: &WaitOptions,
    mut ready: impl FnMut() -> bool,
) -> PortResult<()> {
    // A timeout past the clock's range never expires.
    let deadline = Instant::now().checked_add(options.timeout);
    let backoff = Backoff::new();
    let mut steps = 0u32;
    let mut announced = false;

    loop {
        if ready() {
            if announced {
                tracing::trace!(port, cycle, "ready after wait");
            }
            return Ok(());
        }
        if !announced {
            tracing::trace!(port, cycle, "not ready, waiting");
            announced = true;
        }

        if options.is_cancelled() {
            return Err(PortError::WaitCancelled {
                port: port.to_string(),
                cycle,
            });
        }
        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            tracing::debug!(port, cycle, timeout = ?options.timeout, "remote wait timed out");
            return Err(PortError::WaitTimedOut {
                port: port.to_string(),
                cycle,
            });
        }

        if steps < options.spin_limit && !backoff.is_completed() {
            backoff.snooze();
            steps += 1;
        } else {
            let left = deadline.map_or(MAX_PARK, |deadline| deadline - now);
            std::thread::park_timeout(left.min(MAX_PARK));
        }
    }
}
