//! Metrics and observability utilities
//!
//! Prometheus metrics under a common prefix. The gateway installs the
//! exporter; library code only records.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use std::time::{Duration, Instant};

/// Metrics prefix for all FleetCore metrics
pub const METRICS_PREFIX: &str = "fleetcore";

/// Histogram buckets for request and statement latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s, request timeout
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

    // Pool metrics
    describe_histogram!(
        format!("{}_db_acquire_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time spent waiting for a pooled connection"
    );

    describe_histogram!(
        format!("{}_db_statement_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Statement latency in seconds"
    );

    describe_gauge!(
        format!("{}_db_connections", METRICS_PREFIX),
        Unit::Count,
        "Open database connections"
    );

    describe_gauge!(
        format!("{}_db_connections_idle", METRICS_PREFIX),
        Unit::Count,
        "Idle database connections"
    );

    // Tenant binding
    describe_counter!(
        format!("{}_tenant_binds_total", METRICS_PREFIX),
        Unit::Count,
        "Connections bound to a tenant"
    );

    describe_counter!(
        format!("{}_tenant_bind_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Failed tenant binds"
    );

    describe_counter!(
        format!("{}_rows_dropped_unscanned_total", METRICS_PREFIX),
        Unit::Count,
        "Single-row results dropped before scan"
    );

    // Auth metrics
    describe_counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        Unit::Count,
        "OAuth logins by provider and outcome"
    );

    // Domain metrics
    describe_counter!(
        format!("{}_invitation_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Invitation state transitions"
    );

    describe_counter!(
        format!("{}_bulk_records_total", METRICS_PREFIX),
        Unit::Count,
        "Bulk import outcomes per record"
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

pub fn record_acquire(waited: Duration) {
    histogram!(format!("{}_db_acquire_duration_seconds", METRICS_PREFIX))
        .record(waited.as_secs_f64());
}

/// `bound` tells statements run on a tenant-bound connection apart from raw ones
pub fn record_statement(op: &'static str, bound: bool, elapsed: Duration) {
    histogram!(
        format!("{}_db_statement_duration_seconds", METRICS_PREFIX),
        "op" => op,
        "bound" => if bound { "true" } else { "false" }
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_pool(size: u32, idle: usize) {
    gauge!(format!("{}_db_connections", METRICS_PREFIX)).set(size as f64);
    gauge!(format!("{}_db_connections_idle", METRICS_PREFIX)).set(idle as f64);
}

pub fn record_tenant_bind(success: bool) {
    if success {
        counter!(format!("{}_tenant_binds_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_tenant_bind_failures_total", METRICS_PREFIX)).increment(1);
    }
}

pub fn record_row_dropped() {
    counter!(format!("{}_rows_dropped_unscanned_total", METRICS_PREFIX)).increment(1);
}

pub fn record_login(provider: &'static str, success: bool) {
    counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        "provider" => provider,
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

pub fn record_invitation(transition: &'static str) {
    counter!(
        format!("{}_invitation_transitions_total", METRICS_PREFIX),
        "transition" => transition
    )
    .increment(1);
}

/// Helper to record bulk import outcomes
pub fn record_bulk(table: &'static str, created: usize, skipped: usize, failed: usize) {
    for (outcome, n) in [("created", created), ("skipped", skipped), ("failed", failed)] {
        if n > 0 {
            counter!(
                format!("{}_bulk_records_total", METRICS_PREFIX),
                "table" => table,
                "outcome" => outcome
            )
            .increment(n as u64);
        }
    }
}
