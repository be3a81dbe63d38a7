//! PostgreSQL storage implementation with connection pooling

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Time to wait for a pooled connection, in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/model_market".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// Opens a connection pool for the given configuration
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| map_sqlx_error("Failed to connect to PostgreSQL", e))
}

/// Classifies a sqlx error into the domain taxonomy
///
/// Connection-level failures are retryable, unique violations are conflicts,
/// everything else is a plain storage error.
pub fn map_sqlx_error(context: &str, err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DomainError::unavailable(format!("{}: {}", context, err))
        }
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DomainError::conflict(format!("{}: {}", context, db_err.message()))
        }
        _ => DomainError::storage(format!("{}: {}", context, err)),
    }
}

/// Document storage over PostgreSQL
///
/// Stores entities as JSONB in a table with (key, data, created_at, updated_at)
/// columns. Tables are created by the storage migrations.
pub struct PostgresStorage<E>
where
    E: StorageEntity,
{
    pool: PgPool,
    table_name: String,
    _phantom: PhantomData<E>,
}

impl<E> Debug for PostgresStorage<E>
where
    E: StorageEntity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl<E> PostgresStorage<E>
where
    E: StorageEntity,
{
    /// Creates a new PostgreSQL storage with the given pool and table name
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Self {
        Self {
            pool,
            table_name: table_name.into(),
            _phantom: PhantomData,
        }
    }

    fn decode(row: &sqlx::postgres::PgRow) -> Result<E, DomainError> {
        let data: serde_json::Value = row
            .try_get("data")
            .map_err(|e| map_sqlx_error("Failed to read entity column", e))?;

        serde_json::from_value(data)
            .map_err(|e| DomainError::storage(format!("Failed to deserialize entity: {}", e)))
    }

    fn encode(entity: &E) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(entity)
            .map_err(|e| DomainError::storage(format!("Failed to serialize entity: {}", e)))
    }
}

fn is_field_name(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

#[async_trait]
impl<E> Storage<E> for PostgresStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        let query = format!("SELECT data FROM {} WHERE key = $1", self.table_name);

        let row = sqlx::query(&query)
            .bind(key.as_key())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to get entity", e))?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let query = format!("SELECT data FROM {} ORDER BY created_at", self.table_name);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to list entities", e))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn list_by_field(&self, field: &str, value: &str) -> Result<Vec<E>, DomainError> {
        // Inlined so the planner can match the `(data->>'field')` expression indexes
        if !is_field_name(field) {
            return Err(DomainError::storage(format!("Invalid field name '{}'", field)));
        }

        let query = format!(
            "SELECT data FROM {} WHERE data->>'{}' = $1 ORDER BY created_at",
            self.table_name, field
        );

        let rows = sqlx::query(&query)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to list entities by field", e))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_key();
        let data = Self::encode(&entity)?;

        let query = format!("INSERT INTO {} (key, data) VALUES ($1, $2)", self.table_name);

        sqlx::query(&query)
            .bind(&key)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| match map_sqlx_error("Failed to create entity", e) {
                DomainError::Conflict { .. } => {
                    DomainError::conflict(format!("Entity with key '{}' already exists", key))
                }
                other => other,
            })?;

        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_key();
        let data = Self::encode(&entity)?;

        let query = format!(
            "UPDATE {} SET data = $2, updated_at = NOW() WHERE key = $1",
            self.table_name
        );

        let result = sqlx::query(&query)
            .bind(&key)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to update entity", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Entity with key '{}' not found",
                key
            )));
        }

        Ok(entity)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let query = format!("DELETE FROM {} WHERE key = $1", self.table_name);

        let result = sqlx::query(&query)
            .bind(key.as_key())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to delete entity", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let query = format!("SELECT COUNT(*) FROM {}", self.table_name);

        let count: i64 = sqlx::query_scalar(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to count entities", e))?;

        Ok(count as usize)
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE key = $1)",
            self.table_name
        );

        sqlx::query_scalar(&query)
            .bind(key.as_key())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to check existence", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn test_postgres_config_builder() {
        let config = PostgresConfig::new("postgres://db/market")
            .with_max_connections(25)
            .with_connect_timeout(2);

        assert_eq!(config.url, "postgres://db/market");
        assert_eq!(config.max_connections, 25);
        assert_eq!(config.connect_timeout_secs, 2);
    }

    #[test]
    fn test_pool_errors_are_retryable() {
        assert!(map_sqlx_error("get", sqlx::Error::PoolTimedOut).is_retryable());
        assert!(map_sqlx_error("get", sqlx::Error::PoolClosed).is_retryable());
    }

    #[test]
    fn test_other_errors_are_storage_errors() {
        let err = map_sqlx_error("get", sqlx::Error::RowNotFound);

        assert!(matches!(err, DomainError::Storage { .. }));
        assert!(err.to_string().contains("get"));
    }

    #[test]
    fn test_field_names_are_checked_before_inlining() {
        assert!(is_field_name("developer_id"));
        assert!(is_field_name("email"));
        assert!(!is_field_name(""));
        assert!(!is_field_name("email' OR '1'='1"));
        assert!(!is_field_name("data->>x"));
    }
}
