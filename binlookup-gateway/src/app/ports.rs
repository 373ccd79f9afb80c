use async_trait::async_trait;
use binlookup_core::{CardRecord, Result};
use std::time::Duration;

/// A fixed rate: `rate` operations per `period`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quota {
    pub rate: u32,
    pub period: Duration,
}

impl Quota {
    pub fn per_second(rate: u32) -> Self {
        Self {
            rate,
            period: Duration::from_secs(1),
        }
    }
}

/// Result of one admission check.
#[derive(Clone, Debug, PartialEq)]
pub struct Admission {
    pub admitted: bool,
    pub remaining: u32,
    /// How long until a rejected caller could be admitted, when known.
    pub retry_after: Option<Duration>,
}

impl Admission {
    pub fn admitted(remaining: u32) -> Self {
        Self {
            admitted: true,
            remaining,
            retry_after: None,
        }
    }

    pub fn rejected(retry_after: Option<Duration>) -> Self {
        Self {
            admitted: false,
            remaining: 0,
            retry_after,
        }
    }
}

/// Admission control against a shared quota.
///
/// An `Err` means the counter store could not be consulted. Callers must not
/// treat it as an admission.
#[async_trait]
pub trait RateLimiterPort: Send + Sync {
    async fn allow(&self, key: &str, quota: Quota) -> Result<Admission>;
}

/// The external card data provider.
///
/// `Ok(None)` is the provider saying it has no data for the BIN.
#[async_trait]
pub trait CardDataProviderPort: Send + Sync {
    async fn fetch(&self, bin: &str) -> Result<Option<CardRecord>>;
}
