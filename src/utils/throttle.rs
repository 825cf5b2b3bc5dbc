//! Log throttling utility
//!
//! Limits how often the same log message is recorded, preventing log
//! flooding when errors occur repeatedly (e.g. a source file that fails
//! to decode on every pacer tick).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Log throttler that limits how often the same message is logged
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use synthcam::utils::LogThrottler;
///
/// let throttler = LogThrottler::new(Duration::from_secs(5));
///
/// // First call returns true
/// assert!(throttler.should_log("source_read"));
///
/// // Subsequent calls within 5 seconds return false
/// assert!(!throttler.should_log("source_read"));
/// ```
pub struct LogThrottler {
    /// Map of message key to last log time
    last_logged: RwLock<HashMap<String, Instant>>,
    /// Throttle interval
    interval: Duration,
}

impl LogThrottler {
    /// Create a new log throttler with the specified interval
    pub fn new(interval: Duration) -> Self {
        Self {
            last_logged: RwLock::new(HashMap::new()),
            interval,
        }
    }

    /// Create a new log throttler with interval specified in seconds
    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Check if a message should be logged (not throttled)
    ///
    /// Returns `true` if the message should be logged, `false` if it should
    /// be throttled. If `true` is returned, the internal timestamp is updated.
    pub fn should_log(&self, key: &str) -> bool {
        let now = Instant::now();

        // Fast path with read lock
        {
            let map = self.last_logged.read();
            if let Some(last) = map.get(key) {
                if now.duration_since(*last) < self.interval {
                    return false;
                }
            }
        }

        let mut map = self.last_logged.write();
        // Double-check after acquiring write lock
        if let Some(last) = map.get(key) {
            if now.duration_since(*last) < self.interval {
                return false;
            }
        }
        map.insert(key.to_string(), now);
        true
    }

    /// Clear throttle state for a specific key
    ///
    /// Called when an error condition recovers, so the next error is
    /// logged immediately.
    pub fn clear(&self, key: &str) {
        self.last_logged.write().remove(key);
    }
}

impl Default for LogThrottler {
    /// Create a default log throttler with 5 second interval
    fn default() -> Self {
        Self::with_secs(5)
    }
}
