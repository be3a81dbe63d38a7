//! Usage log service
//!
//! Records calls made with API keys and answers the per-key, per-model,
//! per-user and per-developer usage questions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, warn};

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::model::{AiModel, ModelId, ModelRepository};
use crate::domain::pagination::{Page, PageRequest};
use crate::domain::usage::{DailyUsage, UsageLogEntry, UsageLogRepository, UsageQuery, UsageStats};
use crate::domain::user::UserId;
use crate::domain::DomainError;
use crate::infrastructure::api_key::ApiKeyService;
use crate::infrastructure::observability::record_usage_append;
use crate::infrastructure::storage::StorageDeadline;

/// Days covered by the developer's daily breakdown
pub const DAILY_WINDOW_DAYS: i64 = 30;

/// One call to record
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub input_summary: Option<String>,
    pub response_time_ms: u64,
    pub status_code: u16,
}

/// A model's log page with statistics over all of its entries
#[derive(Debug, Clone)]
pub struct ModelUsagePage {
    pub logs: Page<UsageLogEntry>,
    pub stats: UsageStats,
}

/// A log entry joined with the model it was recorded against
#[derive(Debug, Clone)]
pub struct UserUsageEntry {
    pub entry: UsageLogEntry,
    /// None when the model has been deleted
    pub model: Option<AiModel>,
}

/// Per-model usage joined with the model's listing fields
#[derive(Debug, Clone)]
pub struct ModelUsageReport {
    pub model_id: ModelId,
    pub model_name: String,
    pub category: Option<String>,
    pub stats: UsageStats,
}

/// Usage across everything a developer publishes
#[derive(Debug, Clone, Default)]
pub struct DeveloperStats {
    /// Set when the developer has no models
    pub message: Option<String>,
    pub total_calls: u64,
    pub models: Vec<ModelUsageReport>,
    pub daily: Vec<DailyUsage>,
}

/// Outcome of the metering path
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_key: ApiKey,
    /// None when the entry could not be stored
    pub log: Option<UsageLogEntry>,
}

#[derive(Debug)]
pub struct UsageService {
    logs: Arc<dyn UsageLogRepository>,
    keys: Arc<dyn ApiKeyRepository>,
    models: Arc<dyn ModelRepository>,
    ledger: Arc<ApiKeyService>,
    deadline: StorageDeadline,
}

impl UsageService {
    pub fn new(
        logs: Arc<dyn UsageLogRepository>,
        keys: Arc<dyn ApiKeyRepository>,
        models: Arc<dyn ModelRepository>,
        ledger: Arc<ApiKeyService>,
        deadline: StorageDeadline,
    ) -> Self {
        Self {
            logs,
            keys,
            models,
            ledger,
            deadline,
        }
    }

    /// Store one entry. Failures are logged and never reach the caller.
    pub async fn append(
        &self,
        api_key_id: &ApiKeyId,
        model_id: &ModelId,
        call: CallRecord,
    ) -> Option<UsageLogEntry> {
        let mut entry =
            UsageLogEntry::new(*api_key_id, *model_id, call.response_time_ms, call.status_code);
        if let Some(summary) = call.input_summary {
            entry = entry.with_input_summary(summary);
        }

        match self
            .deadline
            .run("usage_logs.append", self.logs.append(entry))
            .await
        {
            Ok(entry) => {
                record_usage_append(true);
                debug!(log_id = %entry.id, api_key_id = %api_key_id, "Appended usage log");
                Some(entry)
            }
            Err(e) => {
                record_usage_append(false);
                error!(
                    api_key_id = %api_key_id,
                    model_id = %model_id,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Failed to append usage log"
                );
                None
            }
        }
    }

    /// Verify the presented key for the model, then log the call
    pub async fn record_call(
        &self,
        secret: &str,
        model_id: &ModelId,
        call: CallRecord,
    ) -> Result<RecordedCall, DomainError> {
        let api_key = self.ledger.verify(secret, model_id).await?;
        let log = self.append(api_key.id(), model_id, call).await;

        Ok(RecordedCall { api_key, log })
    }

    async fn require_model(&self, model_id: &ModelId) -> Result<AiModel, DomainError> {
        self.deadline
            .run("models.get", self.models.get(model_id))
            .await?
            .ok_or_else(|| DomainError::not_found("Model not found"))
    }

    async fn page(&self, query: UsageQuery, request: PageRequest) -> Result<Page<UsageLogEntry>, DomainError> {
        let total = self
            .deadline
            .run("usage_logs.count", self.logs.count(&query))
            .await?;

        let windowed = query.with_window(request.offset(), u64::from(request.limit()));
        let items = self
            .deadline
            .run("usage_logs.query", self.logs.query(&windowed))
            .await?;

        Ok(Page::new(items, total, request))
    }

    /// Entries for one key; visible to the key's owner and the model's developer
    pub async fn list_by_key(
        &self,
        key_id: &ApiKeyId,
        requester: &UserId,
        request: PageRequest,
    ) -> Result<Page<UsageLogEntry>, DomainError> {
        let key = self
            .deadline
            .run("api_keys.get", self.keys.get(key_id))
            .await?
            .ok_or_else(|| DomainError::not_found("API key not found"))?;

        if !key.is_owned_by(requester) {
            let develops_model = self
                .deadline
                .run("models.get", self.models.get(key.model_id()))
                .await?
                .is_some_and(|m| m.is_owned_by(requester));

            if !develops_model {
                warn!(api_key_id = %key_id, user_id = %requester, "Rejected usage read");
                return Err(DomainError::forbidden("Access denied"));
            }
        }

        self.page(UsageQuery::new().with_api_key(*key_id), request).await
    }

    /// Entries for one model plus statistics over all of them
    pub async fn list_by_model(
        &self,
        model_id: &ModelId,
        requester: &UserId,
        request: PageRequest,
    ) -> Result<ModelUsagePage, DomainError> {
        let model = self.require_model(model_id).await?;

        if !model.is_owned_by(requester) {
            warn!(model_id = %model_id, user_id = %requester, "Rejected model usage read");
            return Err(DomainError::forbidden("Access denied"));
        }

        let query = UsageQuery::new().with_model(*model_id);
        let stats = self
            .deadline
            .run("usage_logs.aggregate", self.logs.aggregate(&query))
            .await?;
        let logs = self.page(query, request).await?;

        Ok(ModelUsagePage { logs, stats })
    }

    /// Entries across all of a user's keys, revoked ones included, with their models
    pub async fn list_by_user(
        &self,
        user_id: &UserId,
        request: PageRequest,
    ) -> Result<Page<UserUsageEntry>, DomainError> {
        let keys = self
            .deadline
            .run("api_keys.list_by_user", self.keys.list_by_user(user_id))
            .await?;

        if keys.is_empty() {
            return Ok(Page::new(Vec::new(), 0, request));
        }

        let key_ids = keys.iter().map(|k| *k.id()).collect();
        let page = self
            .page(UsageQuery::new().with_api_keys(key_ids), request)
            .await?;

        let mut models: HashMap<ModelId, Option<AiModel>> = HashMap::new();
        for entry in &page.items {
            if !models.contains_key(&entry.model_id) {
                let model = self
                    .deadline
                    .run("models.get", self.models.get(&entry.model_id))
                    .await?;
                models.insert(entry.model_id, model);
            }
        }

        Ok(page.map(|entry| UserUsageEntry {
            model: models.get(&entry.model_id).cloned().flatten(),
            entry,
        }))
    }

    /// Totals, per-model breakdown and trailing daily counts for a developer
    pub async fn developer_stats(&self, developer_id: &UserId) -> Result<DeveloperStats, DomainError> {
        let models = self
            .deadline
            .run(
                "models.list_by_developer",
                self.models.list_by_developer(developer_id),
            )
            .await?;

        if models.is_empty() {
            return Ok(DeveloperStats {
                message: Some("No models found".to_string()),
                ..Default::default()
            });
        }

        let model_ids: Vec<ModelId> = models.iter().map(|m| *m.id()).collect();
        let query = UsageQuery::new().with_models(model_ids);

        let total_calls = self
            .deadline
            .run("usage_logs.count", self.logs.count(&query))
            .await?;

        let per_model = self
            .deadline
            .run("usage_logs.aggregate_by_model", self.logs.aggregate_by_model(&query))
            .await?;

        let since = Utc::now() - Duration::days(DAILY_WINDOW_DAYS);
        let daily = self
            .deadline
            .run(
                "usage_logs.daily_counts",
                self.logs.daily_counts(&query.clone().with_since(since)),
            )
            .await?;

        let by_id: HashMap<ModelId, &AiModel> = models.iter().map(|m| (*m.id(), m)).collect();
        let reports = per_model
            .into_iter()
            .filter_map(|usage| {
                by_id.get(&usage.model_id).map(|model| ModelUsageReport {
                    model_id: usage.model_id,
                    model_name: model.name().to_string(),
                    category: model.category().map(str::to_string),
                    stats: usage.stats,
                })
            })
            .collect();

        Ok(DeveloperStats {
            message: None,
            total_calls,
            models: reports,
            daily,
        })
    }
}
