//! Model Market API
//!
//! Backend for an AI model marketplace:
//! - Developers publish models; consumers register and buy per-model API keys
//! - A key ledger issues, verifies and revokes keys with atomic usage counting
//! - Every metered call is logged and rolled up into per-model and per-developer stats
//! - In-memory or PostgreSQL storage behind the same repository traits

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::api_key::ApiKeyRepository;
use domain::model::{AiModel, ModelRepository};
use domain::usage::UsageLogRepository;
use domain::user::{User, UserRepository};
use infrastructure::api_key::{ApiKeyService, InMemoryApiKeyRepository, PostgresApiKeyRepository};
use infrastructure::auth::{Argon2Hasher, JwtGenerator, JwtService};
use infrastructure::model::{ModelService, StorageModelRepository};
use infrastructure::storage::{
    connect_pool, run_storage_migrations, InMemoryStorage, PostgresStorage, StorageConfig,
};
use infrastructure::usage::{InMemoryUsageLogRepository, PostgresUsageLogRepository, UsageService};
use infrastructure::user::{StorageUserRepository, UserService};
use tracing::{info, warn};

/// The four repositories every service is built from
struct Repositories {
    users: Arc<dyn UserRepository>,
    models: Arc<dyn ModelRepository>,
    api_keys: Arc<dyn ApiKeyRepository>,
    usage_logs: Arc<dyn UsageLogRepository>,
}

impl Repositories {
    fn in_memory() -> Self {
        Self {
            users: Arc::new(StorageUserRepository::new(Arc::new(
                InMemoryStorage::<User>::new(),
            ))),
            models: Arc::new(StorageModelRepository::new(Arc::new(
                InMemoryStorage::<AiModel>::new(),
            ))),
            api_keys: Arc::new(InMemoryApiKeyRepository::new()),
            usage_logs: Arc::new(InMemoryUsageLogRepository::new()),
        }
    }

    fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(StorageUserRepository::new(Arc::new(
                PostgresStorage::<User>::new(pool.clone(), "users"),
            ))),
            models: Arc::new(StorageModelRepository::new(Arc::new(
                PostgresStorage::<AiModel>::new(pool.clone(), "ai_models"),
            ))),
            api_keys: Arc::new(PostgresApiKeyRepository::new(pool.clone())),
            usage_logs: Arc::new(PostgresUsageLogRepository::new(pool)),
        }
    }
}

/// Build every service from configuration; Postgres schemas are brought up to date first
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage = config.storage.storage_config()?;
    let deadline = config.storage.deadline();

    info!(
        backend = ?storage.storage_type(),
        timeout_ms = config.storage.timeout_ms,
        "Initializing storage"
    );

    let repositories = match storage {
        StorageConfig::InMemory => Repositories::in_memory(),
        StorageConfig::Postgres(pg) => {
            let pool = connect_pool(&pg).await?;
            let applied = run_storage_migrations(&pool).await?;
            info!(applied, "PostgreSQL schema ready");

            Repositories::postgres(pool)
        }
    };

    if config.auth.uses_default_secret() {
        warn!("Using the default JWT secret; set APP__AUTH__JWT_SECRET in production");
    }
    let jwt_service: Arc<dyn JwtGenerator> = Arc::new(JwtService::new(config.auth.jwt_config()));

    let user_service = Arc::new(UserService::new(
        repositories.users.clone(),
        Arc::new(Argon2Hasher::new()),
        jwt_service.clone(),
        deadline,
    ));
    let model_service = Arc::new(ModelService::new(
        repositories.models.clone(),
        repositories.users.clone(),
        deadline,
    ));
    let api_key_service = Arc::new(ApiKeyService::new(
        repositories.api_keys.clone(),
        repositories.models.clone(),
        repositories.users.clone(),
        deadline,
    ));
    let usage_service = Arc::new(UsageService::new(
        repositories.usage_logs.clone(),
        repositories.api_keys.clone(),
        repositories.models.clone(),
        api_key_service.clone(),
        deadline,
    ));

    Ok(AppState::new(
        user_service,
        model_service,
        api_key_service,
        usage_service,
        jwt_service,
    ))
}
