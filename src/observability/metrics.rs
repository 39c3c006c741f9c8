use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

/// Render every registered metric in the Prometheus text format.
pub async fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = get_metrics().await.registry.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => String::from_utf8_lossy(&buffer).into_owned(),
        Err(e) => format!("# metrics encoding failed: {e}\n"),
    }
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Refresh metrics
    pub refresh_requests: IntCounter,
    pub refresh_failures: IntCounterVec,
    pub refresh_coalesced: IntCounter,

    // Fetch metrics
    pub fetch_attempts: IntCounter,
    pub fetch_failures: IntCounterVec,
    pub fetch_duration: HistogramVec,

    // Config
    pub config_parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,
}

impl Metrics {
    #[allow(clippy::expect_used)]
    fn new() -> Arc<Self> {
        // metric names and labels are static; a failure here is a programming error
        let registry = Registry::new_custom(Some("sessionagent".into()), None)
            .expect("registry prefix is valid");

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Refresh
            refresh_requests: IntCounter::new("refresh_requests_total", "Token exchanges sent to the issuer").expect("valid metric"),
            refresh_failures: IntCounterVec::new(Opts::new("refresh_failures_total", "Failed token exchanges by reason"), &["reason"]).expect("valid metric"),
            refresh_coalesced: IntCounter::new("refresh_coalesced_total", "Callers that joined an in-flight refresh").expect("valid metric"),

            // Fetch
            fetch_attempts: IntCounter::new("fetch_attempts_total", "Network attempts made by resilient fetches").expect("valid metric"),
            fetch_failures: IntCounterVec::new(Opts::new("fetch_attempt_failures_total", "Failed fetch attempts by reason"), &["reason"]).expect("valid metric"),
            fetch_duration: HistogramVec::new(HistogramOpts::new("fetch_duration_seconds", "Duration of a full fetch including retries").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]), &["outcome"]).expect("valid metric"),

            config_parse_failures: IntCounter::new("config_parse_failures_total", "Config files that failed to parse").expect("valid metric"),
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").expect("valid metric"),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(metrics.refresh_requests.clone()),
            Box::new(metrics.refresh_failures.clone()),
            Box::new(metrics.refresh_coalesced.clone()),
            Box::new(metrics.fetch_attempts.clone()),
            Box::new(metrics.fetch_failures.clone()),
            Box::new(metrics.fetch_duration.clone()),
            Box::new(metrics.config_parse_failures.clone()),
            Box::new(metrics.config_validation_errors.clone()),
        ];
        for collector in collectors {
            reg.register(collector).expect("metric registered once");
        }

        metrics
    }
}
