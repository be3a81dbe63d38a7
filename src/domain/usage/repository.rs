//! Usage log repository trait and query

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use super::record::{DailyUsage, ModelUsage, UsageLogEntry, UsageStats};
use crate::domain::api_key::ApiKeyId;
use crate::domain::model::ModelId;
use crate::domain::DomainError;

/// Filter and window over usage entries
///
/// A `None` filter matches everything; an empty list matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageQuery {
    pub api_key_ids: Option<Vec<ApiKeyId>>,
    pub model_ids: Option<Vec<ModelId>>,
    pub since: Option<DateTime<Utc>>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl UsageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(self, api_key_id: ApiKeyId) -> Self {
        self.with_api_keys(vec![api_key_id])
    }

    pub fn with_api_keys(mut self, api_key_ids: Vec<ApiKeyId>) -> Self {
        self.api_key_ids = Some(api_key_ids);
        self
    }

    pub fn with_model(self, model_id: ModelId) -> Self {
        self.with_models(vec![model_id])
    }

    pub fn with_models(mut self, model_ids: Vec<ModelId>) -> Self {
        self.model_ids = Some(model_ids);
        self
    }

    /// Only entries created at or after `since`
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Whether the filter part of the query selects `entry`
    pub fn matches(&self, entry: &UsageLogEntry) -> bool {
        if let Some(ref ids) = self.api_key_ids {
            if !ids.contains(&entry.api_key_id) {
                return false;
            }
        }

        if let Some(ref ids) = self.model_ids {
            if !ids.contains(&entry.model_id) {
                return false;
            }
        }

        if let Some(since) = self.since {
            if entry.created_at < since {
                return false;
            }
        }

        true
    }
}

/// Append-only store for usage entries
///
/// Aggregation methods ignore `offset` and `limit`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsageLogRepository: Send + Sync + Debug {
    /// Insert an entry
    async fn append(&self, entry: UsageLogEntry) -> Result<UsageLogEntry, DomainError>;

    /// Matching entries, newest first, windowed by offset and limit
    async fn query(&self, query: &UsageQuery) -> Result<Vec<UsageLogEntry>, DomainError>;

    /// Number of matching entries
    async fn count(&self, query: &UsageQuery) -> Result<u64, DomainError>;

    /// Statistics over all matching entries
    async fn aggregate(&self, query: &UsageQuery) -> Result<UsageStats, DomainError>;

    /// Statistics grouped by model, busiest model first
    async fn aggregate_by_model(&self, query: &UsageQuery) -> Result<Vec<ModelUsage>, DomainError>;

    /// Call counts grouped by UTC day, oldest day first
    async fn daily_counts(&self, query: &UsageQuery) -> Result<Vec<DailyUsage>, DomainError>;
}
