use crate::app::ports::{Admission, Quota, RateLimiterPort};
use async_trait::async_trait;
use binlookup_core::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Fixed-window limiter kept in process memory.
///
/// Only enforces the quota for a single instance; the Redis limiter is the
/// one to use when several gateways share a provider account.
#[derive(Default)]
pub struct LocalRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

struct Window {
    started: Instant,
    used: u32,
}

impl LocalRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, key: &str, quota: Quota, now: Instant) -> Admission {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            used: 0,
        });

        if now.duration_since(window.started) >= quota.period {
            window.started = now;
            window.used = 0;
        }

        if window.used < quota.rate {
            window.used += 1;
            Admission::admitted(quota.rate - window.used)
        } else {
            let retry_after = (window.started + quota.period).saturating_duration_since(now);
            Admission::rejected(Some(retry_after))
        }
    }
}

#[async_trait]
impl RateLimiterPort for LocalRateLimiter {
    async fn allow(&self, key: &str, quota: Quota) -> Result<Admission> {
        Ok(self.check(key, quota, Instant::now()))
    }
}
