//! PostgreSQL API key repository
//!
//! Uniqueness of the active (user, model) pair comes from the partial index
//! `api_keys_one_active_per_user_model`; the usage counter is bumped with a
//! single `UPDATE ... RETURNING`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository, ApiKeyStatus};
use crate::domain::model::ModelId;
use crate::domain::user::UserId;
use crate::domain::DomainError;
use crate::infrastructure::storage::map_sqlx_error;

const ONE_ACTIVE_INDEX: &str = "api_keys_one_active_per_user_model";

const COLUMNS: &str =
    "id, user_id, model_id, key_prefix, secret_hash, usage_count, status, created_at, revoked_at";

#[derive(Debug, Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_all_where(
        &self,
        context: &str,
        column: &str,
        id: Uuid,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let sql = format!(
            "SELECT {} FROM api_keys WHERE {} = $1 ORDER BY created_at DESC, id",
            COLUMNS, column
        );

        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(context, e))?;

        rows.iter().map(row_to_api_key).collect()
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let sql = format!("SELECT {} FROM api_keys WHERE id = $1", COLUMNS);

        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to get API key", e))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn find_active_by_hash(&self, secret_hash: &str) -> Result<Option<ApiKey>, DomainError> {
        let sql = format!(
            "SELECT {} FROM api_keys WHERE secret_hash = $1 AND status = 'active'",
            COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(secret_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to look up API key", e))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn find_active(
        &self,
        user_id: &UserId,
        model_id: &ModelId,
    ) -> Result<Option<ApiKey>, DomainError> {
        let sql = format!(
            "SELECT {} FROM api_keys WHERE user_id = $1 AND model_id = $2 AND status = 'active'",
            COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(model_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to look up active API key", e))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, user_id, model_id, key_prefix, secret_hash,
                                  usage_count, status, created_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(api_key.id().as_uuid())
        .bind(api_key.user_id().as_uuid())
        .bind(api_key.model_id().as_uuid())
        .bind(api_key.key_prefix())
        .bind(api_key.secret_hash())
        .bind(api_key.usage_count() as i64)
        .bind(api_key.status().as_str())
        .bind(api_key.created_at())
        .bind(api_key.revoked_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let one_active = matches!(
                &e,
                sqlx::Error::Database(db) if db.constraint() == Some(ONE_ACTIVE_INDEX)
            );

            if one_active {
                DomainError::conflict("You already have an active API key for this model")
            } else {
                map_sqlx_error("Failed to create API key", e)
            }
        })?;

        Ok(api_key)
    }

    async fn increment_usage(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let sql = format!(
            "UPDATE api_keys SET usage_count = usage_count + 1 \
             WHERE id = $1 AND status = 'active' RETURNING {}",
            COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to increment API key usage", e))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn revoke(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        // COALESCE keeps the first revocation time on repeated calls
        let sql = format!(
            "UPDATE api_keys SET status = 'revoked', revoked_at = COALESCE(revoked_at, NOW()) \
             WHERE id = $1 RETURNING {}",
            COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to revoke API key", e))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError> {
        self.fetch_all_where("Failed to list API keys by user", "user_id", *user_id.as_uuid())
            .await
    }

    async fn list_by_model(&self, model_id: &ModelId) -> Result<Vec<ApiKey>, DomainError> {
        self.fetch_all_where("Failed to list API keys by model", "model_id", *model_id.as_uuid())
            .await
    }
}

fn row_to_api_key(row: &PgRow) -> Result<ApiKey, DomainError> {
    let column = |e: sqlx::Error| map_sqlx_error("Failed to read API key row", e);

    let id: Uuid = row.try_get("id").map_err(column)?;
    let user_id: Uuid = row.try_get("user_id").map_err(column)?;
    let model_id: Uuid = row.try_get("model_id").map_err(column)?;
    let key_prefix: String = row.try_get("key_prefix").map_err(column)?;
    let secret_hash: String = row.try_get("secret_hash").map_err(column)?;
    let usage_count: i64 = row.try_get("usage_count").map_err(column)?;
    let status: String = row.try_get("status").map_err(column)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(column)?;
    let revoked_at: Option<DateTime<Utc>> = row.try_get("revoked_at").map_err(column)?;

    Ok(ApiKey::restore(
        ApiKeyId::from_uuid(id),
        UserId::from_uuid(user_id),
        ModelId::from_uuid(model_id),
        key_prefix,
        secret_hash,
        u64::try_from(usage_count).unwrap_or_default(),
        status.parse::<ApiKeyStatus>()?,
        created_at,
        revoked_at,
    ))
}
