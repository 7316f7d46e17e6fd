use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;

pub struct Metrics {
    request_counter: Counter<u64>,
    upstream_duration: Histogram<u64>,
    upstream_failures: Counter<u64>,
    pub registry: Registry,
    _provider: SdkMeterProvider,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| prometheus::Error::Msg(e.to_string()))?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("detection_relay");
        global::set_meter_provider(provider.clone());

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of detection requests")
            .build();

        let upstream_duration = meter
            .u64_histogram("upstream_duration_ms")
            .with_boundaries(latency_boundaries(25, 30_000))
            .with_description("Latency of detection API calls in milliseconds")
            .build();

        let upstream_failures = meter
            .u64_counter("upstream_failures_total")
            .with_description("Detection calls that ended in an error")
            .build();

        Ok(Metrics {
            request_counter,
            upstream_duration,
            upstream_failures,
            registry,
            _provider: provider,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_upstream_duration(&self, duration_ms: u64, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.upstream_duration.record(duration_ms, &attributes);
    }

    pub fn record_upstream_failure(&self, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.upstream_failures.add(1, &attributes);
    }
}

/// Doubling buckets from `first` up to and including `last`.
fn latency_boundaries(first: u64, last: u64) -> Vec<f64> {
    let mut boundaries: Vec<f64> = std::iter::successors(Some(first), |b| b.checked_mul(2))
        .take_while(|&b| b < last)
        .map(|b| b as f64)
        .collect();
    boundaries.push(last as f64);
    boundaries
}
