//! Storage-backed user repository

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::storage::Storage;
use crate::domain::user::{normalize_email, User, UserId, UserRepository};
use crate::domain::DomainError;

/// User accounts kept in the generic document store
#[derive(Debug)]
pub struct StorageUserRepository {
    storage: Arc<dyn Storage<User>>,
}

impl StorageUserRepository {
    pub fn new(storage: Arc<dyn Storage<User>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl UserRepository for StorageUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        self.storage.get(id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let email = normalize_email(email);
        let users = self.storage.list_by_field("email", &email).await?;

        Ok(users.into_iter().next())
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        if self.get_by_email(user.email()).await?.is_some() {
            return Err(DomainError::conflict("User already exists"));
        }

        // The Postgres table also carries a unique index on email
        self.storage.create(user).await.map_err(|e| match e {
            DomainError::Conflict { .. } => DomainError::conflict("User already exists"),
            other => other,
        })
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        self.storage.update(user.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::UserType;
    use crate::infrastructure::storage::InMemoryStorage;

    fn repository() -> StorageUserRepository {
        StorageUserRepository::new(Arc::new(InMemoryStorage::<User>::new()))
    }

    #[tokio::test]
    async fn test_get_by_email_is_case_insensitive() {
        let repo = repository();
        let user = User::new("Ada", "ada@example.com", "hash", UserType::Developer);
        repo.create(user.clone()).await.unwrap();

        let found = repo.get_by_email("  ADA@Example.com ").await.unwrap();
        assert_eq!(found.map(|u| *u.id()), Some(*user.id()));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = repository();
        repo.create(User::new("Ada", "ada@example.com", "hash", UserType::Developer))
            .await
            .unwrap();

        let result = repo
            .create(User::new("Other", "Ada@example.com", "hash", UserType::Consumer))
            .await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let repo = repository();
        let user = User::new("Ada", "ada@example.com", "hash", UserType::Developer);

        let result = repo.update(&user).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
