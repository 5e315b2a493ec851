use std::thread;
use std::time::{Duration, Instant};

use super::CancelToken;

const COUNTDOWN_POLL: Duration = Duration::from_millis(50);
const WAIT_SLICE: Duration = Duration::from_millis(5);
/// Below this the rest of a wait goes to `spin_sleep`.
const SPIN_WINDOW: Duration = Duration::from_millis(2);

/// Returns `false` if cancelled before `duration` has passed.
pub fn count_down(duration: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(COUNTDOWN_POLL));
    }
}

/// Blocks until `offset` after `start`. Sleeps in short slices while the
/// target is far off, then hands the last stretch to `spin_sleep`. Returns
/// `false` if cancelled first.
pub fn wait_until(start: Instant, offset: Duration, cancel: &CancelToken) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let elapsed = start.elapsed();
        if elapsed >= offset {
            return true;
        }

        let remaining = offset - elapsed;
        if remaining > SPIN_WINDOW {
            thread::sleep((remaining - SPIN_WINDOW).min(WAIT_SLICE));
        } else {
            spin_sleep::sleep(remaining);
        }
    }
}
