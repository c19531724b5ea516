use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all radio metrics
const PREFIX: &str = "radio";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Rotation Metrics
    pub static ref ROTATION_ADVANCES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_rotation_advances_total"), "Committed track advancements"),
        &["kind", "outcome"]
    ).expect("Failed to create rotation_advances_total metric");

    pub static ref ROTATION_SELECTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_rotation_selection_duration_seconds"),
            "Time from winning the epoch claim to commit"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5]),
        &["kind"]
    ).expect("Failed to create rotation_selection_duration_seconds metric");

    pub static ref ROTATION_CREDIT_RACES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_rotation_credit_races_total"),
        "Promoted selections whose credit was gone at decrement time"
    ).expect("Failed to create rotation_credit_races_total metric");

    pub static ref ROTATION_LEDGER_FALLBACKS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_rotation_ledger_fallbacks_total"),
            "Selections forced to organic because of the credit ledger"
        ),
        &["reason"]
    ).expect("Failed to create rotation_ledger_fallbacks_total metric");

    pub static ref ROTATION_INVARIANT_VIOLATIONS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_rotation_invariant_violations_total"),
        "Stream state and fairness bookkeeping inconsistencies"
    ).expect("Failed to create rotation_invariant_violations_total metric");

    pub static ref ROTATION_NO_CONTENT_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_rotation_no_content_total"),
        "Advancements that found nothing to play"
    ).expect("Failed to create rotation_no_content_total metric");

    pub static ref INGESTION_STALE_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_ingestion_stale_total"), "Heartbeats and reports for a past epoch"),
        &["operation"]
    ).expect("Failed to create ingestion_stale_total metric");

    pub static ref ACTIVE_LISTENERS: Gauge = Gauge::new(
        format!("{PREFIX}_active_listeners"),
        "Listeners that sent a heartbeat recently"
    ).expect("Failed to create active_listeners metric");

    pub static ref CATALOG_ELIGIBLE_SONGS: Gauge = Gauge::new(
        format!("{PREFIX}_catalog_eligible_songs"),
        "Songs eligible for rotation at the last selection"
    ).expect("Failed to create catalog_eligible_songs metric");

    pub static ref STREAM_EPOCH: Gauge = Gauge::new(
        format!("{PREFIX}_stream_epoch"),
        "Current stream epoch"
    ).expect("Failed to create stream_epoch metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ROTATION_ADVANCES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ROTATION_SELECTION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ROTATION_CREDIT_RACES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ROTATION_LEDGER_FALLBACKS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ROTATION_INVARIANT_VIOLATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ROTATION_NO_CONTENT_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(INGESTION_STALE_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ACTIVE_LISTENERS.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_ELIGIBLE_SONGS.clone()));
    let _ = REGISTRY.register(Box::new(STREAM_EPOCH.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a committed advancement
pub fn record_advance(kind: &str, outcome: &str, epoch: u64, duration: Duration) {
    ROTATION_ADVANCES_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
    ROTATION_SELECTION_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
    STREAM_EPOCH.set(epoch as f64);
}

pub fn record_credit_race() {
    ROTATION_CREDIT_RACES_TOTAL.inc();
}

/// `reason` is either "retries_exhausted" or "ledger_unavailable"
pub fn record_ledger_fallback(reason: &str) {
    ROTATION_LEDGER_FALLBACKS_TOTAL
        .with_label_values(&[reason])
        .inc();
}

pub fn record_invariant_violation() {
    ROTATION_INVARIANT_VIOLATIONS_TOTAL.inc();
}

pub fn record_no_content() {
    ROTATION_NO_CONTENT_TOTAL.inc();
}

pub fn record_stale(operation: &str) {
    INGESTION_STALE_TOTAL.with_label_values(&[operation]).inc();
}

pub fn set_active_listeners(count: usize) {
    ACTIVE_LISTENERS.set(count as f64);
}

pub fn set_eligible_songs(count: usize) {
    CATALOG_ELIGIBLE_SONGS.set(count as f64);
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
