use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    attempts: u32,
}

/// Per-action fixed-window attempt counter for client flows (login, register, reset).
///
/// Same semantics as the server limiter: the window starts with the first attempt,
/// and resets once it has fully elapsed.
#[derive(Debug, Clone)]
pub struct ClientRateLimiter {
    max_attempts: u32,
    window: Duration,
    windows: HashMap<String, Window>,
}

impl ClientRateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            windows: HashMap::new(),
        }
    }

    /// Counts an attempt. `Err` carries the seconds until the window resets.
    pub fn attempt(&mut self, action: &str, now: DateTime<Utc>) -> Result<u32, u64> {
        let window = self.window;
        let entry = self.windows.entry(action.to_string()).or_insert(Window {
            started: now,
            attempts: 0,
        });

        if now - entry.started >= window {
            *entry = Window {
                started: now,
                attempts: 0,
            };
        }

        if entry.attempts >= self.max_attempts {
            let remaining = (entry.started + window - now).num_seconds().max(1);
            return Err(remaining as u64);
        }

        entry.attempts += 1;
        Ok(self.max_attempts - entry.attempts)
    }

    /// Forget the counter for an action, e.g. after a successful login.
    pub fn reset(&mut self, action: &str) {
        self.windows.remove(action);
    }
}

impl Default for ClientRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::minutes(DEFAULT_WINDOW_MINUTES))
    }
}
