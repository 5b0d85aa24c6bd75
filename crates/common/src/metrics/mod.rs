//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Roost metrics
pub const METRICS_PREFIX: &str = "roost";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms - P50 target
    0.100, // 100ms
    0.250, // 250ms - P99 target
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Lease lifecycle metrics
    describe_counter!(
        format!("{}_lease_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Total lease lifecycle transitions"
    );

    describe_counter!(
        format!("{}_occupancy_conflicts_total", METRICS_PREFIX),
        Unit::Count,
        "Total rejected lease operations due to occupancy conflicts"
    );

    describe_counter!(
        format!("{}_tenant_moves_total", METRICS_PREFIX),
        Unit::Count,
        "Total tenant reassignments between units"
    );

    // Billing metrics
    describe_counter!(
        format!("{}_invoices_issued_total", METRICS_PREFIX),
        Unit::Count,
        "Total invoices auto-created on lease activation"
    );

    // Database metrics
    describe_gauge!(
        format!("{}_db_connections_active", METRICS_PREFIX),
        Unit::Count,
        "Active database connections"
    );

    describe_histogram!(
        format!("{}_db_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Database query latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a lease lifecycle transition
pub fn record_lease_transition(op: &str, outcome: &str) {
    counter!(
        format!("{}_lease_transitions_total", METRICS_PREFIX),
        "op" => op.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record a rejected occupancy validation
pub fn record_occupancy_conflict(scope: &str) {
    counter!(
        format!("{}_occupancy_conflicts_total", METRICS_PREFIX),
        "scope" => scope.to_string()
    )
    .increment(1);
}

/// Helper to record a tenant move between units
pub fn record_tenant_move() {
    counter!(format!("{}_tenant_moves_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record an auto-created invoice
pub fn record_invoice_issued() {
    counter!(format!("{}_invoices_issued_total", METRICS_PREFIX)).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // P50 target (50ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.050));
        // P99 target (250ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.250));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/leases");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(201);
        // Just verify it runs without panic
    }
}
