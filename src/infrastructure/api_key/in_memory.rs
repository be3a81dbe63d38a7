//! In-memory API key repository
//!
//! All keys live in one map behind a single lock so the active-pair check
//! and the insert, and the counter update, each happen under one write
//! acquisition.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::model::ModelId;
use crate::domain::user::UserId;
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: RwLock<HashMap<ApiKeyId, ApiKey>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ApiKeyId, ApiKey>>, DomainError> {
        self.keys
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ApiKeyId, ApiKey>>, DomainError> {
        self.keys
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }

    fn newest_first(&self, predicate: impl Fn(&ApiKey) -> bool) -> Result<Vec<ApiKey>, DomainError> {
        let mut keys: Vec<ApiKey> = self.read()?.values().filter(|k| predicate(k)).cloned().collect();
        keys.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(keys)
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn find_active_by_hash(&self, secret_hash: &str) -> Result<Option<ApiKey>, DomainError> {
        Ok(self
            .read()?
            .values()
            .find(|k| k.is_active() && k.secret_hash() == secret_hash)
            .cloned())
    }

    async fn find_active(
        &self,
        user_id: &UserId,
        model_id: &ModelId,
    ) -> Result<Option<ApiKey>, DomainError> {
        Ok(self
            .read()?
            .values()
            .find(|k| k.is_active() && k.user_id() == user_id && k.model_id() == model_id)
            .cloned())
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.write()?;

        let duplicate_pair = keys.values().any(|k| {
            k.is_active() && k.user_id() == api_key.user_id() && k.model_id() == api_key.model_id()
        });
        if duplicate_pair {
            return Err(DomainError::conflict(
                "You already have an active API key for this model",
            ));
        }

        if keys.contains_key(api_key.id())
            || keys.values().any(|k| k.secret_hash() == api_key.secret_hash())
        {
            return Err(DomainError::conflict("API key already exists"));
        }

        keys.insert(*api_key.id(), api_key.clone());
        Ok(api_key)
    }

    async fn increment_usage(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let mut keys = self.write()?;

        match keys.get_mut(id) {
            Some(key) if key.is_active() => {
                key.record_usage();
                Ok(Some(key.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn revoke(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let mut keys = self.write()?;

        Ok(keys.get_mut(id).map(|key| {
            key.revoke();
            key.clone()
        }))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError> {
        self.newest_first(|k| k.user_id() == user_id)
    }

    async fn list_by_model(&self, model_id: &ModelId) -> Result<Vec<ApiKey>, DomainError> {
        self.newest_first(|k| k.model_id() == model_id)
    }
}
