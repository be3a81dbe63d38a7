//! In-memory usage log repository

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::model::ModelId;
use crate::domain::usage::{
    DailyUsage, ModelUsage, UsageLogEntry, UsageLogRepository, UsageQuery, UsageStats,
};
use crate::domain::DomainError;

/// Append-only log kept in insertion order
#[derive(Debug, Default)]
pub struct InMemoryUsageLogRepository {
    entries: RwLock<Vec<UsageLogEntry>>,
}

impl InMemoryUsageLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<UsageLogEntry>>, DomainError> {
        self.entries
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn matching<'a>(
        entries: &'a [UsageLogEntry],
        query: &'a UsageQuery,
    ) -> impl Iterator<Item = &'a UsageLogEntry> + 'a {
        entries.iter().filter(move |e| query.matches(e))
    }
}

#[async_trait]
impl UsageLogRepository for InMemoryUsageLogRepository {
    async fn append(&self, entry: UsageLogEntry) -> Result<UsageLogEntry, DomainError> {
        self.entries
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?
            .push(entry.clone());

        Ok(entry)
    }

    async fn query(&self, query: &UsageQuery) -> Result<Vec<UsageLogEntry>, DomainError> {
        let entries = self.read()?;

        let mut selected: Vec<UsageLogEntry> = Self::matching(&entries, query).cloned().collect();
        selected.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let window = selected.into_iter().skip(query.offset as usize);
        Ok(match query.limit {
            Some(limit) => window.take(limit as usize).collect(),
            None => window.collect(),
        })
    }

    async fn count(&self, query: &UsageQuery) -> Result<u64, DomainError> {
        let entries = self.read()?;
        Ok(Self::matching(&entries, query).count() as u64)
    }

    async fn aggregate(&self, query: &UsageQuery) -> Result<UsageStats, DomainError> {
        let entries = self.read()?;
        Ok(Self::matching(&entries, query).collect())
    }

    async fn aggregate_by_model(&self, query: &UsageQuery) -> Result<Vec<ModelUsage>, DomainError> {
        let entries = self.read()?;

        let mut per_model: HashMap<ModelId, UsageStats> = HashMap::new();
        for entry in Self::matching(&entries, query) {
            per_model.entry(entry.model_id).or_default().add(entry);
        }

        let mut usage: Vec<ModelUsage> = per_model
            .into_iter()
            .map(|(model_id, stats)| ModelUsage { model_id, stats })
            .collect();
        usage.sort_by(|a, b| {
            b.stats
                .total
                .cmp(&a.stats.total)
                .then_with(|| a.model_id.cmp(&b.model_id))
        });

        Ok(usage)
    }

    async fn daily_counts(&self, query: &UsageQuery) -> Result<Vec<DailyUsage>, DomainError> {
        let entries = self.read()?;

        let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for entry in Self::matching(&entries, query) {
            *per_day.entry(entry.created_at.date_naive()).or_default() += 1;
        }

        Ok(per_day
            .into_iter()
            .map(|(date, count)| DailyUsage { date, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::ApiKeyId;
    use chrono::{Duration, TimeZone, Utc};

    async fn seeded() -> (InMemoryUsageLogRepository, ApiKeyId, ModelId, ModelId) {
        let repo = InMemoryUsageLogRepository::new();
        let key = ApiKeyId::generate();
        let (busy, quiet) = (ModelId::generate(), ModelId::generate());
        let base = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        for (i, status) in [200u16, 200, 500].into_iter().enumerate() {
            repo.append(
                UsageLogEntry::new(key, busy, 100 * (i as u64 + 1), status)
                    .with_created_at(base + Duration::hours(i as i64 * 12)),
            )
            .await
            .unwrap();
        }
        repo.append(
            UsageLogEntry::new(ApiKeyId::generate(), quiet, 50, 200).with_created_at(base),
        )
        .await
        .unwrap();

        (repo, key, busy, quiet)
    }

    #[tokio::test]
    async fn test_query_newest_first_with_window() {
        let (repo, key, _, _) = seeded().await;

        let all = repo.query(&UsageQuery::new().with_api_key(key)).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let page = repo
            .query(&UsageQuery::new().with_api_key(key).with_window(2, 2))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, all[2].id);
    }

    #[tokio::test]
    async fn test_empty_filter_matches_nothing() {
        let (repo, _, _, _) = seeded().await;
        let query = UsageQuery::new().with_api_keys(Vec::new());

        assert_eq!(repo.count(&query).await.unwrap(), 0);
        assert!(repo.query(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_by_model_sorted_busiest_first() {
        let (repo, _, busy, quiet) = seeded().await;

        let usage = repo.aggregate_by_model(&UsageQuery::new()).await.unwrap();

        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].model_id, busy);
        assert_eq!(usage[0].stats.total, 3);
        assert_eq!(usage[0].stats.success_count, 2);
        assert_eq!(usage[1].model_id, quiet);
    }

    #[tokio::test]
    async fn test_daily_counts_bucket_by_utc_date() {
        let (repo, _, busy, _) = seeded().await;

        let daily = repo
            .daily_counts(&UsageQuery::new().with_model(busy))
            .await
            .unwrap();

        // 12:00 and 00:00 the next day, 12:00 the next day
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(daily[0].count, 1);
        assert_eq!(daily[1].count, 2);
    }

    #[tokio::test]
    async fn test_since_filter() {
        let (repo, key, _, _) = seeded().await;
        let since = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();

        let count = repo
            .count(&UsageQuery::new().with_api_key(key).with_since(since))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
