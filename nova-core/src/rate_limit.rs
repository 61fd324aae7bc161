//! Request admission limiting
//!
//! A fixed one-second window counter shared by every request handler. A
//! request that arrives after the window's budget is spent is rejected with
//! the time left until the window rolls over.

use crate::config::RateLimitConfig;
use crate::orchestrator::{ChatError, ChatResult};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Window {
    started: Instant,
    admitted: u32,
}

/// Fixed-window admission limiter
#[derive(Debug, Clone)]
pub struct AdmissionLimiter {
    limit: u32,
    window: Arc<Mutex<Window>>,
}

impl AdmissionLimiter {
    /// Create a limiter admitting `requests_per_second` requests per window
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            limit: requests_per_second,
            window: Arc::new(Mutex::new(Window {
                started: Instant::now(),
                admitted: 0,
            })),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Admit one request as part of a chat round
    pub fn admit(&self) -> ChatResult<()> {
        self.try_acquire()
            .map_err(|retry_after| ChatError::RateLimitExceeded { retry_after })
    }

    /// Admit one request, or return how long until the next window opens
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        // A poisoned counter is still a valid counter
        let mut window = self
            .window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= WINDOW {
            window.started = now;
            window.admitted = 0;
        }

        if window.admitted < self.limit {
            window.admitted += 1;
            Ok(())
        } else {
            let retry_after = WINDOW.saturating_sub(now.saturating_duration_since(window.started));
            debug!(
                limit = self.limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Request rejected by admission limiter"
            );
            Err(retry_after)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let limiter = AdmissionLimiter::new(3);
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.try_acquire_at(now).is_ok());
        }
        let retry_after = limiter.try_acquire_at(now).unwrap_err();
        assert!(retry_after <= WINDOW);
        assert!(retry_after > Duration::ZERO);
    }

    #[test]
    fn test_window_rolls_over() {
        let limiter = AdmissionLimiter::new(1);
        let start = Instant::now();

        assert!(limiter.try_acquire_at(start).is_ok());
        assert!(limiter.try_acquire_at(start + Duration::from_millis(400)).is_err());
        assert!(limiter.try_acquire_at(start + Duration::from_millis(1100)).is_ok());
    }

    #[test]
    fn test_retry_after_is_remaining_window() {
        let limiter = AdmissionLimiter::new(1);
        let start = Instant::now();
        limiter.try_acquire_at(start).unwrap();

        let retry_after = limiter
            .try_acquire_at(start + Duration::from_millis(300))
            .unwrap_err();
        assert_eq!(retry_after, Duration::from_millis(700));
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let limiter = AdmissionLimiter::new(0);
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn test_clones_share_the_window() {
        let limiter = AdmissionLimiter::new(1);
        let other = limiter.clone();
        assert!(limiter.try_acquire().is_ok());
        assert!(other.try_acquire().is_err());
    }

    #[test]
    fn test_admit_reports_rate_limit_as_chat_error() {
        let limiter = AdmissionLimiter::new(1);
        assert!(limiter.admit().is_ok());

        match limiter.admit() {
            Err(ChatError::RateLimitExceeded { retry_after }) => assert!(retry_after <= WINDOW),
            other => panic!("expected a rate limit rejection, got {:?}", other),
        }
    }
}
