use std::net::SocketAddr;
use std::time::Instant;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations executed. Labels: operation, status.
pub const OPERATIONS_TOTAL: &str = "slotbook_operations_total";

/// Histogram: engine operation latency in seconds. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "slotbook_operation_duration_seconds";

/// Counter: bookings rejected by the availability check.
pub const CONFLICTS_TOTAL: &str = "slotbook_conflicts_total";

/// Counter: bookings rejected by the store's exclusion constraint.
pub const CONSTRAINT_VIOLATIONS_TOTAL: &str = "slotbook_constraint_violations_total";

// ── Change events ───────────────────────────────────────────────

/// Counter: change events handed to the transport. Labels: topic, kind.
pub const EVENTS_PUBLISHED_TOTAL: &str = "slotbook_events_published_total";

/// Counter: change events the transport refused. Labels: topic.
pub const PUBLISH_FAILURES_TOTAL: &str = "slotbook_publish_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL append+fsync duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "slotbook_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Record count and latency for one engine operation.
pub fn record_operation(operation: &'static str, started: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
