//! OTLP metrics implementation.
//!
//! Key metrics:
//! - claimguard_checks_total: Counter for ownership checks by kind and outcome
//! - claimguard_check_latency_seconds: Histogram for check latency
//! - claimguard_placements_total: Counter for recorded placements by state
//! - claimguard_promoted_claims_total: Counter for claims made permanent
//! - claimguard_storage_failures_total: Counter for failed units of work

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Claimguard metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Ownership checks, labelled by kind and outcome.
    pub checks_total: Counter<u64>,
    /// Histogram of check latency in seconds, measured on the worker.
    pub check_latency: Histogram<f64>,
    /// Placements recorded, labelled temporary or permanent.
    pub placements_total: Counter<u64>,
    /// Claims promoted from temporary to permanent.
    pub promoted_claims_total: Counter<u64>,
    /// Units of storage work that returned an error.
    pub storage_failures_total: Counter<u64>,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter) -> Self {
        Self {
            checks_total: meter
                .u64_counter("claimguard_checks_total")
                .with_description("Total number of ownership checks")
                .with_unit("1")
                .init(),
            check_latency: meter
                .f64_histogram("claimguard_check_latency_seconds")
                .with_description("Ownership check latency on the storage worker")
                .with_unit("s")
                .init(),
            placements_total: meter
                .u64_counter("claimguard_placements_total")
                .with_description("Total number of recorded placements")
                .with_unit("1")
                .init(),
            promoted_claims_total: meter
                .u64_counter("claimguard_promoted_claims_total")
                .with_description("Claims promoted from temporary to permanent")
                .with_unit("1")
                .init(),
            storage_failures_total: meter
                .u64_counter("claimguard_storage_failures_total")
                .with_description("Units of storage work that failed")
                .with_unit("1")
                .init(),
        }
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
///
/// # Arguments
///
/// * `otel_endpoint` - Optional OTLP endpoint for metrics export
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        if let Some(endpoint) = otel_endpoint {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(std::time::Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    global::set_meter_provider(provider);
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create OTLP exporter, using no-op metrics");
                    set_manual_provider();
                }
            }
        } else {
            // Recorded but not exported
            set_manual_provider();
        }

        let meter = global::meter("claimguard");
        Metrics::new(&meter)
    });
}

fn set_manual_provider() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    global::set_meter_provider(provider);
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_endpoint(None);
}

/// Get the global metrics instance, if initialized.
#[cfg(test)]
pub(crate) fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Record an ownership check.
pub fn record_check(kind: &'static str, blocked: bool, latency_seconds: f64) {
    if let Some(m) = METRICS.get() {
        let outcome = if blocked { "blocked" } else { "allowed" };
        let attrs = [KeyValue::new("kind", kind), KeyValue::new("outcome", outcome)];
        m.checks_total.add(1, &attrs);
        m.check_latency
            .record(latency_seconds, &[KeyValue::new("kind", kind)]);
    }
}

/// Record a placement and how many claims it promoted.
pub fn record_placement(temporary: bool, promoted: usize) {
    if let Some(m) = METRICS.get() {
        let state = if temporary { "temporary" } else { "permanent" };
        m.placements_total.add(1, &[KeyValue::new("state", state)]);
        if promoted > 0 {
            m.promoted_claims_total.add(promoted as u64, &[]);
        }
    }
}

/// Record a failed unit of storage work.
pub fn record_storage_failure() {
    if let Some(m) = METRICS.get() {
        m.storage_failures_total.add(1, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
        assert!(metrics().is_some());
    }

    #[test]
    fn test_recording_does_not_panic() {
        init_metrics();
        record_check("read", true, 0.001);
        record_check("natural", false, 0.0005);
        record_placement(false, 26);
        record_placement(true, 0);
        record_storage_failure();
    }
}
