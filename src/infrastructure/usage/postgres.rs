//! PostgreSQL usage log repository
//!
//! Aggregations are computed in SQL; the filter part of every statement is
//! the same three nullable predicates.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::api_key::ApiKeyId;
use crate::domain::model::ModelId;
use crate::domain::usage::{
    DailyUsage, ModelUsage, UsageLogEntry, UsageLogId, UsageLogRepository, UsageQuery, UsageStats,
};
use crate::domain::DomainError;
use crate::infrastructure::storage::map_sqlx_error;

const FILTER: &str = "($1::uuid[] IS NULL OR api_key_id = ANY($1)) \
     AND ($2::uuid[] IS NULL OR model_id = ANY($2)) \
     AND ($3::timestamptz IS NULL OR created_at >= $3)";

const STATS_COLUMNS: &str = "COUNT(*) AS total, \
     COUNT(*) FILTER (WHERE status_code >= 200 AND status_code < 300) AS success_count, \
     COALESCE(AVG(response_time_ms), 0)::float8 AS avg_response_time";

#[derive(Debug, Clone)]
pub struct PostgresUsageLogRepository {
    pool: PgPool,
}

impl PostgresUsageLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Filter parameters in bind order
struct FilterBinds {
    api_key_ids: Option<Vec<Uuid>>,
    model_ids: Option<Vec<Uuid>>,
    since: Option<DateTime<Utc>>,
}

impl From<&UsageQuery> for FilterBinds {
    fn from(query: &UsageQuery) -> Self {
        Self {
            api_key_ids: query
                .api_key_ids
                .as_ref()
                .map(|ids| ids.iter().map(|id| *id.as_uuid()).collect()),
            model_ids: query
                .model_ids
                .as_ref()
                .map(|ids| ids.iter().map(|id| *id.as_uuid()).collect()),
            since: query.since,
        }
    }
}

#[async_trait]
impl UsageLogRepository for PostgresUsageLogRepository {
    async fn append(&self, entry: UsageLogEntry) -> Result<UsageLogEntry, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO usage_logs (id, api_key_id, model_id, input_summary,
                                    response_time_ms, status_code, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.api_key_id.as_uuid())
        .bind(entry.model_id.as_uuid())
        .bind(entry.input_summary.as_deref())
        .bind(i64::try_from(entry.response_time_ms).unwrap_or(i64::MAX))
        .bind(i32::from(entry.status_code))
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to append usage log", e))?;

        Ok(entry)
    }

    async fn query(&self, query: &UsageQuery) -> Result<Vec<UsageLogEntry>, DomainError> {
        let sql = format!(
            "SELECT id, api_key_id, model_id, input_summary, response_time_ms, status_code, created_at \
             FROM usage_logs WHERE {} ORDER BY created_at DESC, id DESC OFFSET $4 LIMIT $5",
            FILTER
        );
        let binds = FilterBinds::from(query);

        let rows = sqlx::query(&sql)
            .bind(binds.api_key_ids)
            .bind(binds.model_ids)
            .bind(binds.since)
            .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
            .bind(query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to query usage logs", e))?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn count(&self, query: &UsageQuery) -> Result<u64, DomainError> {
        let sql = format!("SELECT COUNT(*) FROM usage_logs WHERE {}", FILTER);
        let binds = FilterBinds::from(query);

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(binds.api_key_ids)
            .bind(binds.model_ids)
            .bind(binds.since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to count usage logs", e))?;

        Ok(count.max(0) as u64)
    }

    async fn aggregate(&self, query: &UsageQuery) -> Result<UsageStats, DomainError> {
        let sql = format!("SELECT {} FROM usage_logs WHERE {}", STATS_COLUMNS, FILTER);
        let binds = FilterBinds::from(query);

        let row = sqlx::query(&sql)
            .bind(binds.api_key_ids)
            .bind(binds.model_ids)
            .bind(binds.since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to aggregate usage logs", e))?;

        row_to_stats(&row)
    }

    async fn aggregate_by_model(&self, query: &UsageQuery) -> Result<Vec<ModelUsage>, DomainError> {
        let sql = format!(
            "SELECT model_id, {} FROM usage_logs WHERE {} \
             GROUP BY model_id ORDER BY total DESC, model_id",
            STATS_COLUMNS, FILTER
        );
        let binds = FilterBinds::from(query);

        let rows = sqlx::query(&sql)
            .bind(binds.api_key_ids)
            .bind(binds.model_ids)
            .bind(binds.since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to aggregate usage by model", e))?;

        rows.iter()
            .map(|row| {
                let model_id: Uuid = row
                    .try_get("model_id")
                    .map_err(|e| map_sqlx_error("Failed to read model_id", e))?;

                Ok(ModelUsage {
                    model_id: ModelId::from_uuid(model_id),
                    stats: row_to_stats(row)?,
                })
            })
            .collect()
    }

    async fn daily_counts(&self, query: &UsageQuery) -> Result<Vec<DailyUsage>, DomainError> {
        let sql = format!(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS count \
             FROM usage_logs WHERE {} GROUP BY day ORDER BY day",
            FILTER
        );
        let binds = FilterBinds::from(query);

        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(&sql)
            .bind(binds.api_key_ids)
            .bind(binds.model_ids)
            .bind(binds.since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to count usage per day", e))?;

        Ok(rows
            .into_iter()
            .map(|(date, count)| DailyUsage {
                date,
                count: count.max(0) as u64,
            })
            .collect())
    }
}

fn row_to_stats(row: &PgRow) -> Result<UsageStats, DomainError> {
    let column = |e: sqlx::Error| map_sqlx_error("Failed to read usage aggregate", e);

    let total: i64 = row.try_get("total").map_err(column)?;
    let success_count: i64 = row.try_get("success_count").map_err(column)?;
    let avg_response_time: f64 = row.try_get("avg_response_time").map_err(column)?;

    Ok(UsageStats {
        total: total.max(0) as u64,
        success_count: success_count.max(0) as u64,
        avg_response_time,
    })
}

fn row_to_entry(row: &PgRow) -> Result<UsageLogEntry, DomainError> {
    let column = |e: sqlx::Error| map_sqlx_error("Failed to read usage log row", e);

    let id: Uuid = row.try_get("id").map_err(column)?;
    let api_key_id: Uuid = row.try_get("api_key_id").map_err(column)?;
    let model_id: Uuid = row.try_get("model_id").map_err(column)?;
    let input_summary: Option<String> = row.try_get("input_summary").map_err(column)?;
    let response_time_ms: i64 = row.try_get("response_time_ms").map_err(column)?;
    let status_code: i32 = row.try_get("status_code").map_err(column)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(column)?;

    Ok(UsageLogEntry {
        id: UsageLogId::from_uuid(id),
        api_key_id: ApiKeyId::from_uuid(api_key_id),
        model_id: ModelId::from_uuid(model_id),
        input_summary,
        response_time_ms: u64::try_from(response_time_ms).unwrap_or_default(),
        status_code: u16::try_from(status_code)
            .map_err(|_| DomainError::storage(format!("Invalid status code {}", status_code)))?,
        created_at,
    })
}
