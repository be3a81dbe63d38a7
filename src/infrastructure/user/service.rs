//! User service for registration, login and profile management

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::user::{User, UserId, UserRepository, UserType};
use crate::domain::DomainError;
use crate::infrastructure::auth::{JwtGenerator, PasswordHasher};
use crate::infrastructure::storage::StorageDeadline;

/// Request for registering a new account
#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub user_type: UserType,
}

/// Partial profile update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
}

/// A signed-in user together with their bearer token
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

#[derive(Debug)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    jwt: Arc<dyn JwtGenerator>,
    deadline: StorageDeadline,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        jwt: Arc<dyn JwtGenerator>,
        deadline: StorageDeadline,
    ) -> Self {
        Self {
            repository,
            hasher,
            jwt,
            deadline,
        }
    }

    /// Create an account and sign it in
    pub async fn register(&self, request: RegisterUser) -> Result<AuthSession, DomainError> {
        if request.name.trim().is_empty() {
            return Err(DomainError::validation("Name is required"));
        }
        if !request.email.contains('@') {
            return Err(DomainError::validation("A valid email is required"));
        }

        let existing = self
            .deadline
            .run("users.get_by_email", self.repository.get_by_email(&request.email))
            .await?;
        if existing.is_some() {
            return Err(DomainError::conflict("User already exists"));
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = User::new(request.name, request.email, password_hash, request.user_type);

        let user = self
            .deadline
            .run("users.create", self.repository.create(user))
            .await?;

        info!(user_id = %user.id(), user_type = %user.user_type(), "Registered user");

        let token = self.jwt.generate(&user)?;
        Ok(AuthSession { token, user })
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, DomainError> {
        let user = self
            .deadline
            .run("users.get_by_email", self.repository.get_by_email(email))
            .await?;

        let user = match user {
            Some(user) if self.hasher.verify(password, user.password_hash()) => user,
            _ => {
                warn!("Rejected login attempt");
                return Err(DomainError::unauthenticated("Invalid credentials"));
            }
        };

        debug!(user_id = %user.id(), "User logged in");

        let token = self.jwt.generate(&user)?;
        Ok(AuthSession { token, user })
    }

    /// Look up a user by id
    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        self.deadline
            .run("users.get", self.repository.get(id))
            .await
    }

    pub async fn get(&self, id: &UserId) -> Result<User, DomainError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User not found"))
    }

    pub async fn update_profile(
        &self,
        id: &UserId,
        update: ProfileUpdate,
    ) -> Result<User, DomainError> {
        let mut user = self.get(id).await?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("Name cannot be empty"));
            }
            user.set_name(name);
        }
        if let Some(bio) = update.bio {
            user.set_bio(Some(bio));
        }

        let user = self
            .deadline
            .run("users.update", self.repository.update(&user))
            .await?;

        info!(user_id = %user.id(), "Updated profile");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::auth::{Argon2Hasher, JwtConfig, JwtService};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::user::StorageUserRepository;

    fn service() -> UserService {
        let repository = StorageUserRepository::new(Arc::new(InMemoryStorage::<User>::new()));

        UserService::new(
            Arc::new(repository),
            Arc::new(Argon2Hasher::new()),
            Arc::new(JwtService::new(JwtConfig::new("test-secret", 1))),
            StorageDeadline::default(),
        )
    }

    fn register_request(email: &str) -> RegisterUser {
        RegisterUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            user_type: UserType::Developer,
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let service = service();

        let registered = service.register(register_request("ada@example.com")).await.unwrap();
        assert!(!registered.token.is_empty());

        let session = service.login("ADA@example.com", "password123").await.unwrap();
        assert_eq!(session.user.id(), registered.user.id());
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let service = service();
        service.register(register_request("ada@example.com")).await.unwrap();

        let result = service.register(register_request("ada@example.com")).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let result = service().register(register_request("not-an-email")).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let service = service();
        service.register(register_request("ada@example.com")).await.unwrap();

        let result = service.login("ada@example.com", "wrong-password").await;
        assert!(matches!(result, Err(DomainError::Unauthenticated { .. })));

        let result = service.login("nobody@example.com", "password123").await;
        assert!(matches!(result, Err(DomainError::Unauthenticated { .. })));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = service();
        let session = service.register(register_request("ada@example.com")).await.unwrap();

        let updated = service
            .update_profile(
                session.user.id(),
                ProfileUpdate {
                    name: Some("Ada L.".to_string()),
                    bio: Some("Trains small models".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name(), "Ada L.");
        assert_eq!(updated.bio(), Some("Trains small models"));
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let result = service().get(&UserId::generate()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
