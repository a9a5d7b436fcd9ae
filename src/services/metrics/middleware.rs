use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use super::MetricsRegistry;

/// Middleware to collect HTTP request metrics
pub async fn metrics_middleware(
    State(metrics): State<Arc<MetricsRegistry>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_path(req.uri().path()),
    };

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    metrics
        .http_requests_total
        .with_label_values(&[&method, &path, &status])
        .inc();

    metrics
        .http_request_duration_seconds
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapse subject ids in unmatched paths to keep label cardinality bounded.
/// `/polls/domain/site_1/start` -> `/polls/domain/:subject/start`
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut normalized = Vec::with_capacity(segments.len());

    for (index, segment) in segments.iter().enumerate() {
        if segments.first() == Some(&"polls") && index == 2 {
            normalized.push(":subject");
        } else if is_id_like(segment) {
            normalized.push(":id");
        } else {
            normalized.push(*segment);
        }
    }

    format!("/{}", normalized.join("/"))
}

fn is_id_like(segment: &str) -> bool {
    // UUID
    if segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4 {
        return true;
    }

    segment.chars().all(|c| c.is_ascii_digit())
}
