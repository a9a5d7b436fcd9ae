use std::sync::Arc;

use super::MetricsRegistry;

/// Collector for poll session metrics
#[derive(Clone)]
pub struct PollMetricsCollector {
    metrics: Arc<MetricsRegistry>,
}

impl PollMetricsCollector {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    pub fn record_fetch(&self, kind: &str, outcome: &str, duration_secs: f64) {
        self.metrics
            .poll_fetches_total
            .with_label_values(&[kind, outcome])
            .inc();

        self.metrics
            .poll_fetch_duration_seconds
            .with_label_values(&[kind])
            .observe(duration_secs);
    }

    pub fn record_session_started(&self, kind: &str) {
        self.metrics
            .poll_sessions_started_total
            .with_label_values(&[kind])
            .inc();

        self.metrics
            .poll_sessions_active
            .with_label_values(&[kind])
            .inc();
    }

    /// `reason` is one of `completed`, `exhausted`, `stopped`
    pub fn record_session_finished(&self, kind: &str, reason: &str) {
        self.metrics
            .poll_sessions_finished_total
            .with_label_values(&[kind, reason])
            .inc();

        self.metrics
            .poll_sessions_active
            .with_label_values(&[kind])
            .dec();
    }
}
