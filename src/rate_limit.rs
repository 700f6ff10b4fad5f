use std::time::{Duration, Instant};

use dashmap::DashMap;

const MAX_FAILURES: u32 = 5;
const WINDOW: Duration = Duration::from_secs(15 * 60);

/// Per-email brute force limiter shared by Login and ChangePwd.
pub struct LoginRateLimiter {
    /// email -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Check if an attempt is allowed. Returns the seconds to wait otherwise.
    /// Does NOT increment the counter, call `record_failure()` on a bad password.
    pub fn check(&self, email: &str) -> Result<(), u64> {
        self.check_at(&email.to_lowercase(), Instant::now())
    }

    pub fn record_failure(&self, email: &str) {
        self.record_failure_at(&email.to_lowercase(), Instant::now());
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        let blocked = self.entries.get(key).map(|entry| {
            let (count, start) = *entry.value();
            (count, now.saturating_duration_since(start))
        });

        match blocked {
            None => Ok(()),
            Some((_, elapsed)) if elapsed > WINDOW => {
                self.entries.remove_if(key, |_, (_, start)| {
                    now.saturating_duration_since(*start) > WINDOW
                });
                Ok(())
            }
            Some((count, elapsed)) if count >= MAX_FAILURES => {
                Err(WINDOW.as_secs().saturating_sub(elapsed.as_secs()))
            }
            Some(_) => Ok(()),
        }
    }

    fn record_failure_at(&self, key: &str, now: Instant) {
        self.evict_expired(now);

        let mut entry = self.entries.entry(key.to_string()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.saturating_duration_since(*start) > WINDOW {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    /// Drop every entry whose window has closed.
    fn evict_expired(&self, now: Instant) {
        self.entries
            .retain(|_, (_, start)| now.saturating_duration_since(*start) <= WINDOW);
    }

    /// Forget an email after a successful login.
    pub fn clear(&self, email: &str) {
        self.entries.remove(&email.to_lowercase());
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
