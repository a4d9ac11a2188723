//! Helpers shared by the threaded tests.

use std::time::{Duration, Instant};

/// Polls `cond` until it holds or `timeout` passes.
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

pub(crate) const WAIT: Duration = Duration::from_secs(5);
