//! HTTP request metrics
//!
//! Every request is counted and timed by method, matched route and status code on the
//! application's [`Registry`], next to the pipeline counters.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use crate::state::AppState;

const LABELS: &[&str] = &["method", "route", "status"];

/// Buckets for request durations, in milliseconds
const REQUEST_DURATION_BUCKETS_MS: &[f64] =
    &[5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0];

/// Route label for requests that matched no route
const UNMATCHED_ROUTE: &str = "unknown";

#[derive(Clone)]
pub struct HttpMetrics {
    requests_total: IntCounterVec,
    request_duration_ms: HistogramVec,
}

impl HttpMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            LABELS,
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_ms = HistogramVec::new(
            HistogramOpts::new("http_request_duration_ms", "Duration of HTTP requests in ms")
                .buckets(REQUEST_DURATION_BUCKETS_MS.to_vec()),
            LABELS,
        )?;
        registry.register(Box::new(request_duration_ms.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_ms,
        })
    }

    pub fn observe(&self, method: &str, route: &str, status: u16, duration_ms: f64) {
        let status = status.to_string();
        let labels = [method, route, status.as_str()];
        self.requests_total.with_label_values(&labels).inc();
        self.request_duration_ms
            .with_label_values(&labels)
            .observe(duration_ms);
    }
}

/// Count and time every request.
///
/// Routes are labelled by their template (`/media/{id}`), never the raw path.
pub async fn track_http_metrics(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    state
        .http_metrics
        .observe(&method, &route, response.status().as_u16(), duration_ms);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_counts_by_labels() {
        let registry = Registry::new();
        let metrics = HttpMetrics::new(&registry).unwrap();

        metrics.observe("GET", "/media/{id}", 200, 12.0);
        metrics.observe("GET", "/media/{id}", 200, 30.0);
        metrics.observe("GET", "/media/{id}", 404, 3.0);

        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["GET", "/media/{id}", "200"])
                .get(),
            2
        );
        let histogram = metrics
            .request_duration_ms
            .with_label_values(&["GET", "/media/{id}", "200"]);
        assert_eq!(histogram.get_sample_count(), 2);
        assert_eq!(histogram.get_sample_sum(), 42.0);
    }
}
