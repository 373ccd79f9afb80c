use crate::app::ports::{Admission, Quota, RateLimiterPort};
use crate::config::LimiterConfig;
use async_trait::async_trait;
use binlookup_core::{LookupError, Result};
use deadpool_redis::redis::{self, Script};
use deadpool_redis::{Pool, PoolConfig};
use std::time::Duration;
use tracing::{debug, info};

const KEY_PREFIX: &str = "rate:";

// Generic cell rate algorithm with burst equal to the rate. The theoretical
// arrival time (TAT) is the only state, so one key serves every instance.
// Returns {admitted, remaining, retry_after_secs, reset_after_secs}; a
// retry_after of -1 means none.
const GCRA_LUA: &str = r#"
redis.replicate_commands()

local rate_limit_key = KEYS[1]
local burst = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local period = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])

local emission_interval = period / rate
local increment = emission_interval * cost
local burst_offset = emission_interval * burst

-- Keep floats small by measuring from 2017-01-01.
local jan_1_2017 = 1483228800
local now = redis.call("TIME")
now = (now[1] - jan_1_2017) + (now[2] / 1000000)

local tat = redis.call("GET", rate_limit_key)
if not tat then
  tat = now
else
  tat = tonumber(tat)
end
tat = math.max(tat, now)

local new_tat = tat + increment
local allow_at = new_tat - burst_offset
local diff = now - allow_at
local remaining = diff / emission_interval

if remaining < 0 then
  local reset_after = tat - now
  local retry_after = diff * -1
  return {0, 0, tostring(retry_after), tostring(reset_after)}
end

local reset_after = new_tat - now
if reset_after > 0 then
  redis.call("SET", rate_limit_key, new_tat, "EX", math.ceil(reset_after))
end
return {1, remaining, "-1", tostring(reset_after)}
"#;

/// Shared-quota limiter backed by Redis.
///
/// Every gateway instance evaluates the same script against the same key, so
/// the quota is enforced in aggregate. Any Redis failure surfaces as
/// [`LookupError::RateLimiter`].
pub struct RedisRateLimiter {
    pool: Pool,
    script: Script,
}

impl RedisRateLimiter {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            script: Script::new(GCRA_LUA),
        }
    }

    /// Build a pool from config and check that Redis answers.
    pub async fn connect(config: &LimiterConfig) -> Result<Self> {
        info!("Connecting to Redis at {}", config.url);

        let timeout = Duration::from_millis(config.timeout_ms);
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| LookupError::RateLimiter {
                message: format!("Failed to create Redis pool: {e}"),
            })?;

        let mut conn = pool.get().await.map_err(|e| LookupError::RateLimiter {
            message: format!("Failed to connect to Redis: {e}"),
        })?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| LookupError::RateLimiter {
                message: format!("Redis PING failed: {e}"),
            })?;

        info!("Connected to Redis");
        Ok(Self::new(pool))
    }
}

type GcraReply = (i64, i64, String, String);

fn admission_from_reply(reply: &GcraReply) -> Admission {
    let (admitted, remaining, retry_after, _reset_after) = reply;
    if *admitted > 0 {
        return Admission::admitted((*remaining).clamp(0, u32::MAX as i64) as u32);
    }

    let retry_after = retry_after
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);
    Admission::rejected(retry_after)
}

#[async_trait]
impl RateLimiterPort for RedisRateLimiter {
    async fn allow(&self, key: &str, quota: Quota) -> Result<Admission> {
        let mut conn = self.pool.get().await.map_err(|e| LookupError::RateLimiter {
            message: format!("Failed to get Redis connection: {e}"),
        })?;

        let reply: GcraReply = self
            .script
            .key(format!("{KEY_PREFIX}{key}"))
            .arg(quota.rate)
            .arg(quota.rate)
            .arg(quota.period.as_secs_f64())
            .arg(1)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LookupError::RateLimiter {
                message: format!("Rate limit script failed: {e}"),
            })?;

        let admission = admission_from_reply(&reply);
        debug!(
            key,
            admitted = admission.admitted,
            remaining = admission.remaining,
            "Rate limit check"
        );
        Ok(admission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admitted_reply() {
        let reply = (1, 99, "-1".to_string(), "0.01".to_string());
        assert_eq!(admission_from_reply(&reply), Admission::admitted(99));
    }

    #[test]
    fn test_rejected_reply_carries_retry_after() {
        let reply = (0, 0, "0.25".to_string(), "1".to_string());
        let admission = admission_from_reply(&reply);
        assert!(!admission.admitted);
        assert_eq!(admission.retry_after, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_unparseable_retry_after_is_dropped() {
        let reply = (0, 0, "nan".to_string(), "1".to_string());
        assert_eq!(admission_from_reply(&reply), Admission::rejected(None));
    }

    /// Same steps as `GCRA_LUA` with burst == rate and cost 1. `tat` stands
    /// in for the Redis key; Redis truncates the Lua `remaining` to an integer.
    fn scripted_reply(tat: &mut Option<f64>, now: f64, quota: Quota) -> GcraReply {
        let emission_interval = quota.period.as_secs_f64() / f64::from(quota.rate);
        let burst_offset = emission_interval * f64::from(quota.rate);

        let current = tat.unwrap_or(now).max(now);
        let new_tat = current + emission_interval;
        let diff = now - (new_tat - burst_offset);
        let remaining = diff / emission_interval;

        if remaining < 0.0 {
            return (0, 0, (-diff).to_string(), (current - now).to_string());
        }
        *tat = Some(new_tat);
        (1, remaining as i64, "-1".to_string(), (new_tat - now).to_string())
    }

    #[test]
    fn test_burst_boundary() {
        let quota = Quota::per_second(4);
        let mut tat = None;

        let burst: Vec<Admission> = (0..4)
            .map(|_| admission_from_reply(&scripted_reply(&mut tat, 0.0, quota)))
            .collect();
        assert_eq!(
            burst,
            vec![
                Admission::admitted(3),
                Admission::admitted(2),
                Admission::admitted(1),
                Admission::admitted(0),
            ]
        );

        // Fifth call in the same instant waits one emission interval.
        let rejected = admission_from_reply(&scripted_reply(&mut tat, 0.0, quota));
        assert_eq!(rejected, Admission::rejected(Some(Duration::from_millis(250))));

        // A rejection does not move the TAT.
        assert_eq!(tat, Some(1.0));

        // One interval later exactly one more call fits.
        let admitted = admission_from_reply(&scripted_reply(&mut tat, 0.25, quota));
        assert_eq!(admitted, Admission::admitted(0));
        let rejected = admission_from_reply(&scripted_reply(&mut tat, 0.25, quota));
        assert!(!rejected.admitted);
    }

    #[test]
    fn test_idle_key_refills_to_full_burst() {
        let quota = Quota::per_second(4);
        let mut tat = Some(1.0);

        let admission = admission_from_reply(&scripted_reply(&mut tat, 5.0, quota));
        assert_eq!(admission, Admission::admitted(3));
    }

    // Needs a running Redis: REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_quota_exhaustion_against_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let config = LimiterConfig {
            url,
            ..Default::default()
        };
        let limiter = RedisRateLimiter::connect(&config).await.unwrap();
        let key = format!("test-{}", std::process::id());
        let quota = Quota::per_second(3);

        let mut admitted = 0;
        for _ in 0..10 {
            if limiter.allow(&key, quota).await.unwrap().admitted {
                admitted += 1;
            }
        }
        assert!((3..=4).contains(&admitted), "admitted {admitted}");
    }
}
