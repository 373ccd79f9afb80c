//! Lookup pipeline metrics
//!
//! Counters and histograms for each stage of a lookup: cache reads and writes,
//! admission control and provider calls. Recording is a no-op until
//! [`init_metrics`] installs the Prometheus recorder, so tests never need it.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const LOOKUP_REQUESTS_TOTAL: &str = "binlookup_lookup_requests_total";
pub const CACHE_HITS_TOTAL: &str = "binlookup_lookup_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "binlookup_lookup_cache_misses_total";
pub const STORE_READ_ERRORS_TOTAL: &str = "binlookup_lookup_store_read_errors_total";
pub const STORE_WRITE_ERRORS_TOTAL: &str = "binlookup_lookup_store_write_errors_total";
pub const RATE_LIMITED_TOTAL: &str = "binlookup_lookup_rate_limited_total";
pub const LIMITER_ERRORS_TOTAL: &str = "binlookup_lookup_limiter_errors_total";
pub const UPSTREAM_CALLS_TOTAL: &str = "binlookup_lookup_upstream_calls_total";
pub const UPSTREAM_FAILURES_TOTAL: &str = "binlookup_lookup_upstream_failures_total";
pub const LOOKUP_DURATION_SECONDS: &str = "binlookup_lookup_duration_seconds";
pub const UPSTREAM_DURATION_SECONDS: &str = "binlookup_lookup_upstream_duration_seconds";

/// Install the Prometheus recorder. Idempotent.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_metrics();
            info!("Prometheus recorder installed");
            Some(HANDLE.get_or_init(|| handle).clone())
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

fn register_metrics() {
    ::metrics::describe_counter!(LOOKUP_REQUESTS_TOTAL, "Lookups by terminal outcome");
    ::metrics::describe_counter!(CACHE_HITS_TOTAL, "Lookups served from the card record store");
    ::metrics::describe_counter!(CACHE_MISSES_TOTAL, "Lookups not found in the card record store");
    ::metrics::describe_counter!(STORE_READ_ERRORS_TOTAL, "Card record store read failures");
    ::metrics::describe_counter!(STORE_WRITE_ERRORS_TOTAL, "Card record store write failures");
    ::metrics::describe_counter!(RATE_LIMITED_TOTAL, "Misses rejected by the shared quota");
    ::metrics::describe_counter!(LIMITER_ERRORS_TOTAL, "Rate counter store failures");
    ::metrics::describe_counter!(UPSTREAM_CALLS_TOTAL, "Calls made to the card data provider");
    ::metrics::describe_counter!(UPSTREAM_FAILURES_TOTAL, "Provider calls without usable data");
    ::metrics::describe_histogram!(LOOKUP_DURATION_SECONDS, "End-to-end lookup latency");
    ::metrics::describe_histogram!(UPSTREAM_DURATION_SECONDS, "Provider call latency");
}

/// Metrics collection for the lookup pipeline
pub struct LookupMetrics;

impl LookupMetrics {
    pub fn record_outcome(outcome: &'static str, duration: Duration) {
        ::metrics::counter!(LOOKUP_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
        ::metrics::histogram!(LOOKUP_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    pub fn record_cache_hit() {
        ::metrics::counter!(CACHE_HITS_TOTAL).increment(1);
    }

    pub fn record_cache_miss() {
        ::metrics::counter!(CACHE_MISSES_TOTAL).increment(1);
    }

    pub fn record_store_read_error() {
        ::metrics::counter!(STORE_READ_ERRORS_TOTAL).increment(1);
    }

    pub fn record_store_write_error() {
        ::metrics::counter!(STORE_WRITE_ERRORS_TOTAL).increment(1);
    }

    pub fn record_rate_limited() {
        ::metrics::counter!(RATE_LIMITED_TOTAL).increment(1);
    }

    pub fn record_limiter_error() {
        ::metrics::counter!(LIMITER_ERRORS_TOTAL).increment(1);
    }

    pub fn record_upstream_call(duration: Duration) {
        ::metrics::counter!(UPSTREAM_CALLS_TOTAL).increment(1);
        ::metrics::histogram!(UPSTREAM_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    /// `kind` is `no_data` or an error kind such as `status` or `timeout`.
    pub fn record_upstream_failure(kind: &'static str) {
        ::metrics::counter!(UPSTREAM_FAILURES_TOTAL, "kind" => kind).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in this binary that installs the global recorder.
    #[test]
    fn test_recorded_metrics_are_rendered() {
        let handle = init_metrics().expect("recorder installs");

        LookupMetrics::record_cache_hit();
        LookupMetrics::record_upstream_failure("timeout");
        LookupMetrics::record_outcome("fetched", Duration::from_millis(3));

        let rendered = handle.render();
        assert!(rendered.contains(CACHE_HITS_TOTAL), "{rendered}");
        assert!(
            rendered.contains(r#"binlookup_lookup_upstream_failures_total{kind="timeout"}"#),
            "{rendered}"
        );
        assert!(
            rendered.contains(r#"binlookup_lookup_requests_total{outcome="fetched"}"#),
            "{rendered}"
        );
        assert!(rendered.contains(LOOKUP_DURATION_SECONDS), "{rendered}");

        // Second call hands back the same handle.
        assert!(init_metrics().is_some());
    }

    #[test]
    fn test_metric_names_share_prefix() {
        for name in [
            LOOKUP_REQUESTS_TOTAL,
            CACHE_HITS_TOTAL,
            STORE_WRITE_ERRORS_TOTAL,
            UPSTREAM_DURATION_SECONDS,
        ] {
            assert!(name.starts_with("binlookup_lookup_"), "{name}");
        }
    }
}
