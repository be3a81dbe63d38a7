//! Prometheus metrics

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid regex")
});

static NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("valid regex"));

const MAX_PATH_LABEL_LEN: usize = 64;

/// Handle used to render the exposition format
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder when enabled
pub fn init_metrics(enabled: bool) -> Option<PrometheusMetrics> {
    if !enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("model_market_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized at /metrics");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

pub fn create_metrics_router(metrics: PrometheusMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Count an API key verification by outcome (valid, invalid, mismatch, error)
pub fn record_key_verification(outcome: &'static str) {
    counter!("api_key_verifications_total", "outcome" => outcome).increment(1);
}

pub fn record_usage_append(stored: bool) {
    let outcome = if stored { "stored" } else { "dropped" };
    counter!("usage_log_appends_total", "outcome" => outcome).increment(1);
}

/// Collapse ids in a path so labels stay low-cardinality
fn sanitize_path(path: &str) -> String {
    let path = UUID_SEGMENT.replace_all(path, "{id}");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/{id}$1");

    path.chars().take(MAX_PATH_LABEL_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_uuid() {
        let path = "/api/usage/key/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(sanitize_path(path), "/api/usage/key/{id}");
    }

    #[test]
    fn test_sanitize_path_numeric_id() {
        assert_eq!(sanitize_path("/api/models/42/status"), "/api/models/{id}/status");
    }

    #[test]
    fn test_sanitize_path_static() {
        assert_eq!(sanitize_path("/api/keys/my-keys"), "/api/keys/my-keys");
    }

    #[test]
    fn test_sanitize_path_truncates() {
        let long = format!("/api/{}", "segment/".repeat(20));
        assert_eq!(sanitize_path(&long).chars().count(), MAX_PATH_LABEL_LEN);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_key_verification("valid");
        record_usage_append(false);
        record_http_request("GET", "/health", 200, Duration::from_millis(3));
    }
}
