//! API Key repository trait

use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{ApiKey, ApiKeyId};
use crate::domain::model::ModelId;
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Repository trait for API key storage
///
/// Implementations must provide two storage-level guarantees: `create`
/// rejects a second active key for the same (user, model) pair, and
/// `increment_usage` applies the counter update atomically.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + Debug {
    /// Get an API key by its ID
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Find the active key whose secret hashes to `secret_hash`
    async fn find_active_by_hash(&self, secret_hash: &str) -> Result<Option<ApiKey>, DomainError>;

    /// Find the active key a user holds for a model, if any
    async fn find_active(
        &self,
        user_id: &UserId,
        model_id: &ModelId,
    ) -> Result<Option<ApiKey>, DomainError>;

    /// Persist a new key; Conflict if the pair already has an active key
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    /// Increment the usage counter of an active key in place.
    /// Returns None when the key does not exist or is no longer active.
    async fn increment_usage(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Mark a key revoked; a no-op for keys already revoked
    async fn revoke(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Keys owned by a user, newest first
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError>;

    /// Keys issued against a model, newest first
    async fn list_by_model(&self, model_id: &ModelId) -> Result<Vec<ApiKey>, DomainError>;
}
