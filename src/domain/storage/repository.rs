//! Storage trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::StorageEntity;

/// Generic storage trait for CRUD operations on document-shaped entities
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity + 'static,
{
    /// Retrieves an entity by its key
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError>;

    /// Retrieves all entities
    async fn list(&self) -> Result<Vec<E>, DomainError>;

    /// Creates a new entity, returns error if already exists
    async fn create(&self, entity: E) -> Result<E, DomainError>;

    /// Updates an existing entity, returns error if not found
    async fn update(&self, entity: E) -> Result<E, DomainError>;

    /// Deletes an entity by its key, returns true if deleted
    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError>;

    /// Retrieves entities whose top-level `field` holds the string `value`
    async fn list_by_field(&self, field: &str, value: &str) -> Result<Vec<E>, DomainError> {
        let mut matching = Vec::new();

        for entity in self.list().await? {
            let document = serde_json::to_value(&entity).map_err(|e| {
                DomainError::storage(format!("Failed to serialize entity: {}", e))
            })?;
            if document.get(field).and_then(|v| v.as_str()) == Some(value) {
                matching.push(entity);
            }
        }

        Ok(matching)
    }

    /// Checks if an entity exists by its key
    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Returns the count of entities
    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.list().await?.len())
    }
}
