//! User repository trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::entity::{User, UserId};
use crate::domain::DomainError;

/// Credential store: persistence for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Get a user by ID
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Get a user by normalized email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Create a new user; fails with Conflict when the email is taken
    async fn create(&self, user: User) -> Result<User, DomainError>;

    /// Update an existing user
    async fn update(&self, user: &User) -> Result<User, DomainError>;
}
