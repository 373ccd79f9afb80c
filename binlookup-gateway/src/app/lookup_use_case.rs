use crate::app::ports::{CardDataProviderPort, Quota, RateLimiterPort};
use crate::app::single_flight::SingleFlight;
use crate::observability::metrics::LookupMetrics;
use binlookup_core::storage::Storage;
use binlookup_core::{bin_prefix, is_valid_bin, CardRecord};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Where a returned record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordSource {
    Cache,
    Upstream,
}

/// Terminal state of one lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupOutcome {
    InvalidInput,
    Found {
        record: CardRecord,
        source: RecordSource,
    },
    RateLimited {
        retry_after: Option<Duration>,
    },
    ServerError,
    NotFound,
}

impl LookupOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            LookupOutcome::InvalidInput => "invalid_input",
            LookupOutcome::Found {
                source: RecordSource::Cache,
                ..
            } => "cache_hit",
            LookupOutcome::Found {
                source: RecordSource::Upstream,
                ..
            } => "fetched",
            LookupOutcome::RateLimited { .. } => "rate_limited",
            LookupOutcome::ServerError => "server_error",
            LookupOutcome::NotFound => "not_found",
        }
    }
}

#[derive(Clone, Debug)]
pub struct LookupSettings {
    /// Key of the single quota shared by every provider call.
    pub rate_limit_key: String,
    pub quota: Quota,
    pub strict_store_reads: bool,
    pub single_flight: bool,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            rate_limit_key: "bin-lookup-gateway".to_string(),
            quota: Quota::per_second(100),
            strict_store_reads: false,
            single_flight: false,
        }
    }
}

/// Validate, read the store, and on a miss spend quota on a provider call
/// whose result is written back to the store.
///
/// The sequence is strictly linear: no step is retried and a later step never
/// runs after an earlier one produced a terminal outcome.
pub struct LookupUseCase {
    storage: Arc<dyn Storage>,
    limiter: Arc<dyn RateLimiterPort>,
    provider: Arc<dyn CardDataProviderPort>,
    settings: LookupSettings,
    in_flight: Option<SingleFlight<LookupOutcome>>,
}

impl LookupUseCase {
    pub fn new(
        storage: Arc<dyn Storage>,
        limiter: Arc<dyn RateLimiterPort>,
        provider: Arc<dyn CardDataProviderPort>,
        settings: LookupSettings,
    ) -> Self {
        let in_flight = settings.single_flight.then(SingleFlight::new);
        Self {
            storage,
            limiter,
            provider,
            settings,
            in_flight,
        }
    }

    pub async fn lookup(&self, raw_bin: &str) -> LookupOutcome {
        let started = Instant::now();
        let bin = raw_bin.trim();

        let outcome = if is_valid_bin(bin) {
            let span = info_span!("lookup", bin_prefix = %bin_prefix(bin));
            self.lookup_valid(bin).instrument(span).await
        } else {
            debug!("Rejected malformed BIN input");
            LookupOutcome::InvalidInput
        };

        LookupMetrics::record_outcome(outcome.label(), started.elapsed());
        outcome
    }

    async fn lookup_valid(&self, bin: &str) -> LookupOutcome {
        match self.storage.get_card_record_by_bin(bin).await {
            Ok(Some(record)) => {
                debug!("Served from store");
                LookupMetrics::record_cache_hit();
                return LookupOutcome::Found {
                    record,
                    source: RecordSource::Cache,
                };
            }
            Ok(None) => {
                LookupMetrics::record_cache_miss();
            }
            Err(e) => {
                LookupMetrics::record_store_read_error();
                if self.settings.strict_store_reads {
                    error!("Store read failed: {}", e);
                    return LookupOutcome::ServerError;
                }
                warn!("Store read failed, falling back to provider: {}", e);
            }
        }

        match &self.in_flight {
            Some(in_flight) => {
                in_flight
                    .run(bin_prefix(bin), || self.fetch_and_store(bin))
                    .await
            }
            None => self.fetch_and_store(bin).await,
        }
    }

    async fn fetch_and_store(&self, bin: &str) -> LookupOutcome {
        let admission = match self
            .limiter
            .allow(&self.settings.rate_limit_key, self.settings.quota)
            .await
        {
            Ok(admission) => admission,
            Err(e) => {
                error!("Rate limiter error: {}", e);
                LookupMetrics::record_limiter_error();
                return LookupOutcome::ServerError;
            }
        };

        if !admission.admitted {
            info!("Rate limit exceeded");
            LookupMetrics::record_rate_limited();
            return LookupOutcome::RateLimited {
                retry_after: admission.retry_after,
            };
        }

        let started = Instant::now();
        let fetched = self.provider.fetch(bin).await;
        LookupMetrics::record_upstream_call(started.elapsed());

        let mut record = match fetched {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Provider has no data");
                LookupMetrics::record_upstream_failure("no_data");
                return LookupOutcome::NotFound;
            }
            Err(e) => {
                warn!(kind = e.kind(), "Provider call failed: {}", e);
                LookupMetrics::record_upstream_failure(e.kind());
                return LookupOutcome::NotFound;
            }
        };

        record.backfill_bin_prefix(bin);

        // A lost write only costs a later miss.
        if let Err(e) = self.storage.create_card_record(&record).await {
            warn!("Failed to save card record: {}", e);
            LookupMetrics::record_store_write_error();
        }

        LookupOutcome::Found {
            record,
            source: RecordSource::Upstream,
        }
    }
}
