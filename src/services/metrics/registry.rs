use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Central metrics registry for the dashboard backend
pub struct MetricsRegistry {
    registry: Registry,

    // HTTP Metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // Poll Metrics
    pub poll_fetches_total: CounterVec,
    pub poll_fetch_duration_seconds: HistogramVec,
    pub poll_sessions_active: GaugeVec,
    pub poll_sessions_started_total: CounterVec,
    pub poll_sessions_finished_total: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        // HTTP Metrics
        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests").namespace("sitebuilder"),
            &["method", "endpoint", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration")
                .namespace("sitebuilder")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        // Poll Metrics
        let poll_fetches_total = CounterVec::new(
            Opts::new("poll_fetches_total", "Status fetches issued by poll sessions")
                .namespace("sitebuilder"),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(poll_fetches_total.clone()))?;

        let poll_fetch_duration_seconds = HistogramVec::new(
            HistogramOpts::new("poll_fetch_duration_seconds", "Status fetch latency")
                .namespace("sitebuilder")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["kind"],
        )?;
        registry.register(Box::new(poll_fetch_duration_seconds.clone()))?;

        let poll_sessions_active = GaugeVec::new(
            Opts::new("poll_sessions_active", "Poll sessions currently polling")
                .namespace("sitebuilder"),
            &["kind"],
        )?;
        registry.register(Box::new(poll_sessions_active.clone()))?;

        let poll_sessions_started_total = CounterVec::new(
            Opts::new("poll_sessions_started_total", "Poll sessions started")
                .namespace("sitebuilder"),
            &["kind"],
        )?;
        registry.register(Box::new(poll_sessions_started_total.clone()))?;

        let poll_sessions_finished_total = CounterVec::new(
            Opts::new("poll_sessions_finished_total", "Poll sessions finished by reason")
                .namespace("sitebuilder"),
            &["kind", "reason"],
        )?;
        registry.register(Box::new(poll_sessions_finished_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            poll_fetches_total,
            poll_fetch_duration_seconds,
            poll_sessions_active,
            poll_sessions_started_total,
            poll_sessions_finished_total,
        }))
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
