//! Model repository trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::entity::{AiModel, ModelId};
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Model registry persistence
#[async_trait]
pub trait ModelRepository: Send + Sync + Debug {
    /// Get a model by ID
    async fn get(&self, id: &ModelId) -> Result<Option<AiModel>, DomainError>;

    /// List all models
    async fn list(&self) -> Result<Vec<AiModel>, DomainError>;

    /// List the models published by one developer
    async fn list_by_developer(&self, developer_id: &UserId) -> Result<Vec<AiModel>, DomainError> {
        let models = self.list().await?;
        Ok(models
            .into_iter()
            .filter(|m| m.is_owned_by(developer_id))
            .collect())
    }

    /// Create a new model
    async fn create(&self, model: AiModel) -> Result<AiModel, DomainError>;

    /// Update an existing model
    async fn update(&self, model: &AiModel) -> Result<AiModel, DomainError>;

    /// Delete a model, returns true if deleted
    async fn delete(&self, id: &ModelId) -> Result<bool, DomainError>;
}
