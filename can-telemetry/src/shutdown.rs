//! Cooperative cancellation for the worker threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep inside [`CancellationToken::sleep`]
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared shutdown flag handed to every worker at construction
///
/// Clones observe the same flag. Workers poll [`is_cancelled`] once per loop
/// iteration, and every blocking call they make has a bounded timeout.
///
/// [`is_cancelled`]: CancellationToken::is_cancelled
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown of every worker holding this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns `true` if the full duration elapsed, `false` on cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
