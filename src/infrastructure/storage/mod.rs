//! Storage infrastructure - Storage implementations

mod deadline;
mod factory;
mod in_memory;
pub mod migrations;
mod postgres;

pub use deadline::StorageDeadline;
pub use factory::{StorageConfig, StorageType};
pub use in_memory::InMemoryStorage;
pub use migrations::{run_storage_migrations, Migration, PostgresMigrator};
pub use postgres::{connect_pool, map_sqlx_error, PostgresConfig, PostgresStorage};
