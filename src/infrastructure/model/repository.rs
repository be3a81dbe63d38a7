//! Storage-backed model repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::model::{AiModel, ModelId, ModelRepository};
use crate::domain::storage::Storage;
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Model listings kept in the generic document store
#[derive(Debug)]
pub struct StorageModelRepository {
    storage: Arc<dyn Storage<AiModel>>,
}

impl StorageModelRepository {
    pub fn new(storage: Arc<dyn Storage<AiModel>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ModelRepository for StorageModelRepository {
    async fn get(&self, id: &ModelId) -> Result<Option<AiModel>, DomainError> {
        self.storage.get(id).await
    }

    async fn list(&self) -> Result<Vec<AiModel>, DomainError> {
        self.storage.list().await
    }

    async fn list_by_developer(&self, developer_id: &UserId) -> Result<Vec<AiModel>, DomainError> {
        self.storage
            .list_by_field("developer_id", &developer_id.to_string())
            .await
    }

    async fn create(&self, model: AiModel) -> Result<AiModel, DomainError> {
        self.storage.create(model).await
    }

    async fn update(&self, model: &AiModel) -> Result<AiModel, DomainError> {
        self.storage.update(model.clone()).await
    }

    async fn delete(&self, id: &ModelId) -> Result<bool, DomainError> {
        self.storage.delete(id).await
    }
}
