pub mod local_rate_limiter;
pub mod provider_client;
pub mod redis_rate_limiter;

pub use local_rate_limiter::LocalRateLimiter;
pub use provider_client::ProviderClient;
pub use redis_rate_limiter::RedisRateLimiter;
