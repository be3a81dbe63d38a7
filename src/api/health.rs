//! Health, readiness and liveness checks

use std::future::Future;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::warn;

use super::state::AppState;
use crate::api::types::Json;
use crate::domain::pagination::PageRequest;
use crate::domain::user::UserId;
use crate::domain::DomainError;
use crate::infrastructure::model::ModelFilter;

/// Detailed health response with component status
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Health check status
#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Individual component health check
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Simple health check - returns 200 if the service is running
/// Used for basic liveness checks
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// Readiness check: every storage backend must answer a cheap read
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let filter = ModelFilter::default();
    let key_owner = UserId::generate();
    let log_owner = UserId::generate();

    let (models, api_keys, usage_logs) = futures::join!(
        check_store("models", state.model_service.list(&filter, None)),
        check_store("api_keys", state.api_key_service.list_by_owner(&key_owner)),
        check_store(
            "usage_logs",
            state.usage_service.list_by_user(&log_owner, PageRequest::default()),
        ),
    );
    let checks = vec![models, api_keys, usage_logs];

    let overall_status = if checks.iter().all(|c| c.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    let response = HealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(checks),
        latency_ms: Some(start.elapsed().as_millis() as u64),
    };

    let status_code = match overall_status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Liveness check - the process is up and serving
pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn check_store<T, F>(name: &str, check: F) -> HealthCheck
where
    F: Future<Output = Result<T, DomainError>>,
{
    let start = Instant::now();
    let result = check.await;
    let latency_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(_) => HealthCheck {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            message: None,
            latency_ms,
        },
        Err(e) => {
            warn!(check = name, error = %e, "Readiness check failed");
            HealthCheck {
                name: name.to_string(),
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
                latency_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(serde_json::to_string(&HealthStatus::Healthy).unwrap(), "\"healthy\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Unhealthy).unwrap(), "\"unhealthy\"");
    }

    #[test]
    fn test_liveness_response_omits_checks() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "1.0.0".to_string(),
            checks: None,
            latency_ms: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(!json.contains("checks"));
    }

    #[tokio::test]
    async fn test_check_store_reports_failure() {
        let check = check_store("usage_logs", async {
            Err::<(), _>(DomainError::unavailable("usage_logs.count timed out after 5000ms"))
        })
        .await;

        assert_eq!(check.name, "usage_logs");
        assert!(check.status == HealthStatus::Unhealthy);
        assert!(check.message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_check_store_healthy() {
        let check = check_store("models", async { Ok::<_, DomainError>(Vec::<u8>::new()) }).await;

        assert!(check.status == HealthStatus::Healthy);
        assert!(check.message.is_none());
        assert!(check.latency_ms.is_some());
    }
}
