use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    suppressed: u64,
}

static WINDOWS: OnceLock<Mutex<HashMap<&'static str, Window>>> = OnceLock::new();

/// Rate-limits a recurring log line identified by `key`.
///
/// Returns `Some(suppressed)` when the line should be logged, where
/// `suppressed` counts the occurrences swallowed since the previous emission,
/// and `None` while the current window is still open.
pub fn should_emit(key: &'static str, interval: Duration) -> Option<u64> {
    let mut windows = WINDOWS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let now = Instant::now();

    match windows.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(Window {
                opened_at: now,
                suppressed: 0,
            });
            Some(0)
        }
        Entry::Occupied(mut slot) => {
            let window = slot.get_mut();
            if now.duration_since(window.opened_at) >= interval {
                let suppressed = std::mem::take(&mut window.suppressed);
                window.opened_at = now;
                Some(suppressed)
            } else {
                window.suppressed += 1;
                None
            }
        }
    }
}
