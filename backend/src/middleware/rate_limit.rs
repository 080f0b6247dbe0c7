use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// In-memory sliding-window rate limiter keyed by client identity
/// (usually the remote IP). Guards the login and refresh endpoints.
pub struct RateLimiter {
    /// Maps keys to the timestamps of their requests inside the window
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
    /// Maximum number of requests allowed within the time window
    max_attempts: usize,
    /// Time window for rate limiting
    window: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_attempts` - Maximum requests allowed within the window
    /// * `window_secs` - Time window in seconds
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Count a request for `key` and report whether it is within budget.
    /// Rejected requests are not counted.
    pub fn allow(&self, key: &str) -> bool {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        // Forget keys whose whole history has aged out
        attempts.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.window);
            !times.is_empty()
        });

        let entry = attempts.entry(key.to_string()).or_default();
        if entry.len() >= self.max_attempts {
            return false;
        }

        entry.push(now);
        true
    }
}
