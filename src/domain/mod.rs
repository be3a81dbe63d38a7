//! Domain layer - Core business logic and entities

pub mod api_key;
pub mod error;
pub mod model;
pub mod pagination;
pub mod storage;
pub mod usage;
pub mod user;

pub use api_key::{ApiKey, ApiKeyId, ApiKeyRepository, ApiKeyStatus};
pub use error::DomainError;
pub use model::{AiModel, ModelDraft, ModelId, ModelRepository, ModelStatus, PricingType};
pub use pagination::{Page, PageRequest};
pub use storage::{Storage, StorageEntity, StorageKey};
pub use usage::{
    DailyUsage, ModelUsage, UsageLogEntry, UsageLogId, UsageLogRepository, UsageQuery, UsageStats,
};
pub use user::{User, UserId, UserRepository, UserType};
