//! Schema migrations for the PostgreSQL backend

use sqlx::postgres::PgPool;
use tracing::info;

use super::postgres::map_sqlx_error;
use crate::domain::DomainError;

/// A versioned schema change with its inverse
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub up: String,
    pub down: String,
}

impl Migration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Applies and reverts migrations, tracking them in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to create migrations table", e))?;

        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)")
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to check migration status", e))
    }

    /// Applies a migration unless it is already recorded.
    /// Returns whether anything ran.
    pub async fn run_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        if self.is_applied(migration.version).await? {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to open migration transaction", e))?;

        // Multi-statement bodies need the simple query protocol
        sqlx::raw_sql(&migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to record migration", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit migration", e))?;

        info!(
            version = migration.version,
            description = %migration.description,
            "Applied migration"
        );

        Ok(true)
    }

    /// Reverts a migration if it is recorded
    pub async fn revert_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        if !self.is_applied(migration.version).await? {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to open migration transaction", e))?;

        sqlx::raw_sql(&migration.down)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to revert migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("DELETE FROM _migrations WHERE version = $1")
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to remove migration record", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit migration revert", e))?;

        info!(version = migration.version, "Reverted migration");

        Ok(true)
    }

    /// Latest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to get migration version", e))
    }
}

/// Schema for users, models, api keys and usage logs
pub fn storage_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create users table",
            r#"
            CREATE TABLE IF NOT EXISTS users (
                key VARCHAR(255) PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users ((data->>'email'));
            "#,
            "DROP TABLE IF EXISTS users;",
        ),
        Migration::new(
            2,
            "Create ai_models table",
            r#"
            CREATE TABLE IF NOT EXISTS ai_models (
                key VARCHAR(255) PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_ai_models_developer ON ai_models ((data->>'developer_id'));
            CREATE INDEX IF NOT EXISTS idx_ai_models_created_at ON ai_models(created_at);
            "#,
            "DROP TABLE IF EXISTS ai_models;",
        ),
        Migration::new(
            3,
            "Create api_keys table",
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                model_id UUID NOT NULL,
                key_prefix VARCHAR(32) NOT NULL,
                secret_hash VARCHAR(128) NOT NULL UNIQUE,
                usage_count BIGINT NOT NULL DEFAULT 0 CHECK (usage_count >= 0),
                status VARCHAR(16) NOT NULL DEFAULT 'active',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                revoked_at TIMESTAMPTZ
            );
            CREATE INDEX IF NOT EXISTS idx_api_keys_user ON api_keys(user_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_api_keys_model ON api_keys(model_id, created_at DESC);
            CREATE UNIQUE INDEX IF NOT EXISTS api_keys_one_active_per_user_model
                ON api_keys(user_id, model_id) WHERE status = 'active';
            "#,
            "DROP TABLE IF EXISTS api_keys;",
        ),
        Migration::new(
            4,
            "Create usage_logs table",
            r#"
            CREATE TABLE IF NOT EXISTS usage_logs (
                id UUID PRIMARY KEY,
                api_key_id UUID NOT NULL,
                model_id UUID NOT NULL,
                input_summary TEXT,
                response_time_ms BIGINT NOT NULL CHECK (response_time_ms >= 0),
                status_code INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_usage_logs_key ON usage_logs(api_key_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_usage_logs_model ON usage_logs(model_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_usage_logs_created_at ON usage_logs(created_at);
            "#,
            "DROP TABLE IF EXISTS usage_logs;",
        ),
    ]
}

/// Runs all pending storage migrations, returning how many were applied
pub async fn run_storage_migrations(pool: &PgPool) -> Result<usize, DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());
    let mut applied = 0;

    for migration in storage_migrations() {
        if migrator.run_migration(&migration).await? {
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_migrations_ascending() {
        let migrations = storage_migrations();

        assert_eq!(migrations.len(), 4);
        assert!(migrations.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn test_storage_migrations_content() {
        for migration in storage_migrations() {
            assert!(!migration.description.is_empty());
            assert!(migration.up.contains("CREATE TABLE"));
            assert!(migration.down.contains("DROP TABLE"));
        }
    }

    #[test]
    fn test_api_keys_enforces_one_active_key() {
        let api_keys = &storage_migrations()[2];

        assert!(api_keys.up.contains("api_keys_one_active_per_user_model"));
        assert!(api_keys.up.contains("WHERE status = 'active'"));
    }
}
