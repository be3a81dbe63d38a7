//! Metering and usage reporting endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::middleware::{PresentedApiKey, RequireUser};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, PageQuery, PaginationResponse, Query, ValidJson};
use crate::domain::api_key::ApiKeyId;
use crate::domain::model::{AiModel, ModelId};
use crate::domain::pagination::Page;
use crate::domain::usage::{DailyUsage, UsageLogEntry, UsageStats};
use crate::infrastructure::usage::{CallRecord, DeveloperStats, ModelUsageReport, UserUsageEntry};

use super::keys::ApiKeyResponse;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordCallRequest {
    pub model_id: String,
    pub input_summary: Option<String>,
    pub response_time_ms: u64,
    #[validate(range(min = 100, max = 599, message = "status_code must be a valid HTTP status"))]
    pub status_code: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageLogResponse {
    pub id: String,
    pub api_key_id: String,
    pub model_id: String,
    pub input_summary: Option<String>,
    pub response_time_ms: u64,
    pub status_code: u16,
    pub created_at: DateTime<Utc>,
}

impl From<&UsageLogEntry> for UsageLogResponse {
    fn from(entry: &UsageLogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            api_key_id: entry.api_key_id.to_string(),
            model_id: entry.model_id.to_string(),
            input_summary: entry.input_summary.clone(),
            response_time_ms: entry.response_time_ms,
            status_code: entry.status_code,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedCallResponse {
    pub message: String,
    pub api_key: ApiKeyResponse,
    pub log: Option<UsageLogResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageLogsResponse {
    pub logs: Vec<UsageLogResponse>,
    pub pagination: PaginationResponse,
}

impl From<&Page<UsageLogEntry>> for UsageLogsResponse {
    fn from(page: &Page<UsageLogEntry>) -> Self {
        Self {
            logs: page.items.iter().map(UsageLogResponse::from).collect(),
            pagination: PaginationResponse::from(page),
        }
    }
}

/// Name and category of the model a call went to
#[derive(Debug, Clone, Serialize)]
pub struct CalledModelSummary {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
}

impl From<&AiModel> for CalledModelSummary {
    fn from(model: &AiModel) -> Self {
        Self {
            id: model.id().to_string(),
            name: model.name().to_string(),
            category: model.category().map(String::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserUsageLogResponse {
    #[serde(flatten)]
    pub log: UsageLogResponse,
    pub model: Option<CalledModelSummary>,
}

impl From<&UserUsageEntry> for UserUsageLogResponse {
    fn from(item: &UserUsageEntry) -> Self {
        Self {
            log: UsageLogResponse::from(&item.entry),
            model: item.model.as_ref().map(CalledModelSummary::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserUsageLogsResponse {
    pub logs: Vec<UserUsageLogResponse>,
    pub pagination: PaginationResponse,
}

impl From<&Page<UserUsageEntry>> for UserUsageLogsResponse {
    fn from(page: &Page<UserUsageEntry>) -> Self {
        Self {
            logs: page.items.iter().map(UserUsageLogResponse::from).collect(),
            pagination: PaginationResponse::from(page),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogStatsResponse {
    pub total: u64,
    pub success_rate: f64,
    pub avg_response_time: f64,
}

impl From<&UsageStats> for LogStatsResponse {
    fn from(stats: &UsageStats) -> Self {
        Self {
            total: stats.total,
            success_rate: round2(stats.success_rate()),
            avg_response_time: round2(stats.avg_response_time),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelLogsResponse {
    pub logs: Vec<UsageLogResponse>,
    pub stats: LogStatsResponse,
    pub pagination: PaginationResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatsResponse {
    pub model_id: String,
    pub model_name: String,
    pub category: Option<String>,
    pub total_calls: u64,
    pub avg_response_time: f64,
    pub success_rate: f64,
}

impl From<&ModelUsageReport> for ModelStatsResponse {
    fn from(report: &ModelUsageReport) -> Self {
        Self {
            model_id: report.model_id.to_string(),
            model_name: report.model_name.clone(),
            category: report.category.clone(),
            total_calls: report.stats.total,
            avg_response_time: round2(report.stats.avg_response_time),
            success_rate: round2(report.stats.success_rate()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyStatResponse {
    #[serde(rename = "_id")]
    pub date: String,
    pub count: u64,
}

impl From<&DailyUsage> for DailyStatResponse {
    fn from(day: &DailyUsage) -> Self {
        Self {
            date: day.date.format("%Y-%m-%d").to_string(),
            count: day.count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeveloperStatsBody {
    pub total_calls: u64,
    pub models_data: Vec<ModelStatsResponse>,
    pub daily_stats: Vec<DailyStatResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeveloperStatsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub stats: DeveloperStatsBody,
}

impl From<DeveloperStats> for DeveloperStatsResponse {
    fn from(stats: DeveloperStats) -> Self {
        Self {
            message: stats.message,
            stats: DeveloperStatsBody {
                total_calls: stats.total_calls,
                models_data: stats.models.iter().map(ModelStatsResponse::from).collect(),
                daily_stats: stats.daily.iter().map(DailyStatResponse::from).collect(),
            },
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// POST /api/usage/calls
pub async fn record_call(
    State(state): State<AppState>,
    PresentedApiKey(secret): PresentedApiKey,
    ValidJson(request): ValidJson<RecordCallRequest>,
) -> Result<(StatusCode, Json<RecordedCallResponse>), ApiError> {
    let model_id: ModelId = request.model_id.parse()?;
    let call = CallRecord {
        input_summary: request.input_summary,
        response_time_ms: request.response_time_ms,
        status_code: request.status_code,
    };

    let recorded = state
        .usage_service
        .record_call(&secret, &model_id, call)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordedCallResponse {
            message: "Call recorded".to_string(),
            api_key: ApiKeyResponse::from(&recorded.api_key),
            log: recorded.log.as_ref().map(UsageLogResponse::from),
        }),
    ))
}

/// GET /api/usage/key/{key_id}
pub async fn list_key_usage(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(key_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<UsageLogsResponse>, ApiError> {
    let key_id: ApiKeyId = key_id.parse()?;
    let logs = state
        .usage_service
        .list_by_key(&key_id, user.id(), page.into())
        .await?;

    Ok(Json(UsageLogsResponse::from(&logs)))
}

/// GET /api/usage/model/{model_id}
pub async fn list_model_usage(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(model_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ModelLogsResponse>, ApiError> {
    let model_id: ModelId = model_id.parse()?;
    let usage = state
        .usage_service
        .list_by_model(&model_id, user.id(), page.into())
        .await?;

    Ok(Json(ModelLogsResponse {
        logs: usage.logs.items.iter().map(UsageLogResponse::from).collect(),
        stats: LogStatsResponse::from(&usage.stats),
        pagination: PaginationResponse::from(&usage.logs),
    }))
}

/// GET /api/usage/my-usage
pub async fn list_my_usage(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<UserUsageLogsResponse>, ApiError> {
    let logs = state
        .usage_service
        .list_by_user(user.id(), page.into())
        .await?;

    Ok(Json(UserUsageLogsResponse::from(&logs)))
}

/// GET /api/usage/developer/stats
pub async fn developer_stats(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<DeveloperStatsResponse>, ApiError> {
    let stats = state.usage_service.developer_stats(user.id()).await?;

    Ok(Json(DeveloperStatsResponse::from(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_stats_are_rounded() {
        let stats = UsageStats {
            total: 3,
            success_count: 2,
            avg_response_time: 200.0 / 3.0,
        };

        let response = LogStatsResponse::from(&stats);
        assert_eq!(response.success_rate, 66.67);
        assert_eq!(response.avg_response_time, 66.67);
    }

    #[test]
    fn test_daily_stat_uses_id_key() {
        let day = DailyUsage {
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            count: 4,
        };

        let json = serde_json::to_value(DailyStatResponse::from(&day)).unwrap();
        assert_eq!(json["_id"], "2024-03-10");
        assert_eq!(json["count"], 4);
    }

    #[test]
    fn test_empty_developer_stats_shape() {
        let response = DeveloperStatsResponse::from(DeveloperStats {
            message: Some("No models found".to_string()),
            ..Default::default()
        });

        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["message"], "No models found");
        assert_eq!(json["stats"]["total_calls"], 0);
        assert!(json["stats"]["models_data"].as_array().unwrap().is_empty());
    }
}
