//! Migrate command - applies the PostgreSQL schema and exits

use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::storage::{connect_pool, run_storage_migrations, StorageConfig};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging);

    let StorageConfig::Postgres(pg) = config.storage.storage_config()? else {
        anyhow::bail!("migrate requires storage.backend = \"postgres\"");
    };

    let pool = connect_pool(&pg).await?;
    let applied = run_storage_migrations(&pool).await?;
    pool.close().await;

    info!(applied, "Migrations complete");
    Ok(())
}
