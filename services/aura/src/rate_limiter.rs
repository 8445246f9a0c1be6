//! Login attempt limiter
//!
//! Counts failed logins per username. Too many failures inside the window ban
//! the username for a while; a successful login clears the counter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failed attempts allowed per window
    pub max_attempts: u32,
    /// Period over which failures are counted
    pub window: Duration,
    /// How long a key stays banned once the limit is reached
    pub ban_duration: Duration,
}

/// Failure count for one key
#[derive(Debug)]
struct AttemptWindow {
    failures: u32,
    window_start: Instant,
    banned_until: Option<Instant>,
}

impl AttemptWindow {
    /// Whether the entry no longer affects any decision
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.banned_until {
            Some(until) => now >= until,
            None => now.duration_since(self.window_start) >= window,
        }
    }
}

/// In-process login rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    /// Rate limiter entries, keyed by username
    entries: Arc<Mutex<HashMap<String, AttemptWindow>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `key` may attempt a login right now
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(banned_until) = entries.get(key).map(|entry| entry.banned_until) else {
            return true;
        };

        match banned_until {
            Some(until) if Instant::now() < until => false,
            Some(_) => {
                entries.remove(key);
                true
            }
            None => true,
        }
    }

    /// Record a failed attempt, banning the key once the limit is reached
    pub async fn record_failure(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = self.config.window;
        entries.retain(|_, entry| !entry.is_stale(now, window));

        let entry = entries.entry(key.to_string()).or_insert(AttemptWindow {
            failures: 0,
            window_start: now,
            banned_until: None,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.failures = 0;
            entry.window_start = now;
        }

        entry.failures += 1;
        if entry.failures >= self.config.max_attempts {
            entry.banned_until = Some(now + self.config.ban_duration);
            info!(
                "Banned login for {} for {} seconds",
                key,
                self.config.ban_duration.as_secs()
            );
        }
    }

    /// Forget all failures for `key`
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, ban: Duration) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts,
            window: Duration::from_secs(60),
            ban_duration: ban,
        })
    }

    #[tokio::test]
    async fn test_bans_after_max_failures() {
        let limiter = limiter(3, Duration::from_secs(60));

        for _ in 0..2 {
            limiter.record_failure("alice").await;
            assert!(limiter.is_allowed("alice").await);
        }
        limiter.record_failure("alice").await;

        assert!(!limiter.is_allowed("alice").await);
        assert!(limiter.is_allowed("bob").await);
    }

    #[tokio::test]
    async fn test_reset_clears_failures() {
        let limiter = limiter(2, Duration::from_secs(60));
        limiter.record_failure("alice").await;
        limiter.reset("alice").await;
        limiter.record_failure("alice").await;

        assert!(limiter.is_allowed("alice").await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_pruned() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 3,
            window: Duration::from_millis(200),
            ban_duration: Duration::from_millis(200),
        });

        for i in 0..100 {
            limiter.record_failure(&format!("user-{i}")).await;
        }
        for _ in 0..3 {
            limiter.record_failure("banned").await;
        }
        assert_eq!(limiter.entries.lock().await.len(), 101);

        tokio::time::sleep(Duration::from_millis(300)).await;
        limiter.record_failure("alice").await;

        let entries = limiter.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("alice"));
    }

    #[tokio::test]
    async fn test_ban_expires() {
        let limiter = limiter(1, Duration::from_millis(20));
        limiter.record_failure("alice").await;
        assert!(!limiter.is_allowed("alice").await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.is_allowed("alice").await);
    }
}
