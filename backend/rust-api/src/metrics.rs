use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Database Metrics (MongoDB)
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Rate limiter (Redis)
    pub static ref RATE_LIMIT_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limit_decisions_total",
        "Rate limiter decisions by scope",
        &["scope", "decision"]
    )
    .unwrap();

    // Business Metrics
    pub static ref ANSWERS_RECORDED_TOTAL: IntCounter = register_int_counter!(
        "answers_recorded_total",
        "Total number of questionnaire answers recorded"
    )
    .unwrap();

    pub static ref ASSESSMENTS_FINALIZED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "assessments_finalized_total",
        "Finalization attempts by outcome",
        &["status"]
    )
    .unwrap();

    pub static ref DRAFTS_ACTIVE: IntGauge = register_int_gauge!(
        "drafts_active",
        "Active drafts seen at the last admin stats query"
    )
    .unwrap();

    pub static ref EMAILS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "emails_sent_total",
        "Outgoing emails by kind and delivery status",
        &["kind", "status"]
    )
    .unwrap();

    pub static ref REMINDER_ITEMS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reminder_items_total",
        "Reminder batch items by outcome",
        &["status"]
    )
    .unwrap();

    pub static ref DRAFTS_EXPIRED_TOTAL: IntCounter = register_int_counter!(
        "drafts_expired_total",
        "Drafts deleted by the expiry cleanup"
    )
    .unwrap();

    pub static ref LIFECYCLE_WORKER_TICKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "lifecycle_worker_ticks_total",
        "Total number of lifecycle worker ticks",
        &["status"]
    )
    .unwrap();

    pub static ref EXPORTS_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exports_generated_total",
        "Total number of admin exports generated",
        &["format"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track database operation with metrics
pub async fn track_db_operation<F, T, E>(operation: &str, collection: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

pub fn record_email(kind: &str, status: &str) {
    EMAILS_SENT_TOTAL.with_label_values(&[kind, status]).inc();
}
