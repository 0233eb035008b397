//! Per-user fixed-window request limiting for authenticated routes.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of an allowed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets.
    pub reset_after: u64,
}

/// Thread-safe counters keyed by user id.
///
/// Each check holds the entry lock for that user while it reads and bumps the
/// counter, so concurrent requests from one user are never undercounted.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<Uuid, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Counts a request. `Err` carries the seconds to wait before retrying.
    pub fn check(&self, user_id: Uuid) -> Result<RateLimitInfo, u64> {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&self, user_id: Uuid, now: Instant) -> Result<RateLimitInfo, u64> {
        let mut entry = self.windows.entry(user_id).or_insert(Window {
            started: now,
            count: 0,
        });

        let mut elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
            elapsed = Duration::ZERO;
        }

        let reset_after = self.window.saturating_sub(elapsed).as_secs().max(1);
        if entry.count >= self.max_requests {
            return Err(reset_after);
        }

        entry.count += 1;
        Ok(RateLimitInfo {
            limit: self.max_requests,
            remaining: self.max_requests - entry.count,
            reset_after,
        })
    }

    /// Drops windows that have fully elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before - self.windows.len()
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_REQUESTS,
            Duration::from_secs(DEFAULT_WINDOW_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_blocks_request_past_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let user = Uuid::new_v4();
        let now = Instant::now();

        for remaining in [2, 1, 0] {
            assert_eq!(limiter.check_at(user, now).unwrap().remaining, remaining);
        }
        let retry = limiter
            .check_at(user, now + Duration::from_secs(20))
            .unwrap_err();
        assert_eq!(retry, 40);

        // Other users are unaffected
        assert!(limiter.check_at(Uuid::new_v4(), now).is_ok());
    }

    #[test]
    fn test_window_resets_after_elapsing() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let user = Uuid::new_v4();
        let now = Instant::now();

        assert!(limiter.check_at(user, now).is_ok());
        assert!(limiter.check_at(user, now).is_err());
        assert!(limiter.check_at(user, now + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_purge_expired() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let now = Instant::now();
        limiter.check_at(Uuid::new_v4(), now).unwrap();
        limiter
            .check_at(Uuid::new_v4(), now + Duration::from_secs(30))
            .unwrap();

        assert_eq!(limiter.purge_expired_at(now + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_concurrent_requests_are_all_counted() {
        let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60)));
        let user = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..25).filter(|_| limiter.check(user).is_ok()).count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }
}
