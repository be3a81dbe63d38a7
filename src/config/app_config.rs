use serde::Deserialize;

use crate::domain::DomainError;
use crate::infrastructure::auth::JwtConfig;
use crate::infrastructure::storage::{PostgresConfig, StorageConfig, StorageDeadline, StorageType};

pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageSettings,
    pub auth: AuthConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Storage section, resolved into a `StorageConfig` at startup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            database_url: None,
            max_connections: 10,
            timeout_ms: StorageDeadline::DEFAULT_MS,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expiration_hours: 24,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl StorageSettings {
    /// Resolve the backend selection; postgres requires a database url
    pub fn storage_config(&self) -> Result<StorageConfig, DomainError> {
        match self.backend.parse::<StorageType>()? {
            StorageType::InMemory => Ok(StorageConfig::InMemory),
            StorageType::Postgres => {
                let url = self.database_url.as_deref().ok_or_else(|| {
                    DomainError::configuration("storage.database_url is required for postgres")
                })?;

                Ok(StorageConfig::Postgres(
                    PostgresConfig::new(url).with_max_connections(self.max_connections),
                ))
            }
        }
    }

    pub fn deadline(&self) -> StorageDeadline {
        StorageDeadline::from_millis(self.timeout_ms)
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret.is_empty() || self.jwt_secret == DEFAULT_JWT_SECRET
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(self.jwt_secret.clone(), self.jwt_expiration_hours)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.timeout_ms, 5000);
        assert!(config.auth.uses_default_secret());
        assert!(config.observability.metrics_enabled);
    }

    #[test]
    fn test_memory_backend_resolves() {
        let settings = StorageSettings::default();
        assert!(matches!(settings.storage_config().unwrap(), StorageConfig::InMemory));
    }

    #[test]
    fn test_postgres_backend_requires_url() {
        let settings = StorageSettings {
            backend: "postgres".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.storage_config(),
            Err(DomainError::Configuration { .. })
        ));

        let settings = StorageSettings {
            backend: "postgres".to_string(),
            database_url: Some("postgres://db/market".to_string()),
            max_connections: 4,
            ..Default::default()
        };
        assert!(matches!(
            settings.storage_config().unwrap(),
            StorageConfig::Postgres(_)
        ));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let settings = StorageSettings {
            backend: "cassandra".to_string(),
            ..Default::default()
        };
        assert!(settings.storage_config().is_err());
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: AppConfig = config::Config::builder()
            .set_override("storage.backend", "postgres")
            .unwrap()
            .set_override("logging.format", "json")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.storage.backend, "postgres");
        assert_eq!(config.storage.max_connections, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
