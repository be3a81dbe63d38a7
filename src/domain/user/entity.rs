//! User entity and related types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Opaque user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DomainError::invalid_id(format!("Invalid user id '{}'", s)))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for UserId {
    fn as_key(&self) -> String {
        self.0.to_string()
    }
}

/// Role a user plays in the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Publishes models
    Developer,
    /// Buys keys and calls models
    #[default]
    Consumer,
    Both,
}

impl UserType {
    /// Developers and dual-role accounts may manage models
    pub fn is_developer(&self) -> bool {
        matches!(self, Self::Developer | Self::Both)
    }
}

impl FromStr for UserType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "developer" => Ok(Self::Developer),
            "consumer" => Ok(Self::Consumer),
            "both" => Ok(Self::Both),
            other => Err(DomainError::validation(format!(
                "Invalid user type '{}', expected developer, consumer or both",
                other
            ))),
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Developer => write!(f, "developer"),
            Self::Consumer => write!(f, "consumer"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Marketplace account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    /// Stored trimmed and lowercased
    email: String,
    /// Argon2 password hash
    password_hash: String,
    user_type: UserType,
    #[serde(default)]
    bio: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user
    pub fn new(
        name: impl Into<String>,
        email: impl AsRef<str>,
        password_hash: impl Into<String>,
        user_type: UserType,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: UserId::generate(),
            name: name.into().trim().to_string(),
            email: normalize_email(email.as_ref()),
            password_hash: password_hash.into(),
            user_type,
            bio: None,
            created_at: now,
            updated_at: now,
        }
    }

    // Getters

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    pub fn bio(&self) -> Option<&str> {
        self.bio.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_developer(&self) -> bool {
        self.user_type.is_developer()
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into().trim().to_string();
        self.touch();
    }

    pub fn set_bio(&mut self, bio: Option<String>) {
        self.bio = bio;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for User {
    type Key = UserId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

/// Canonical form used for uniqueness checks and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new("  Ada ", " Ada@Example.COM ", "hash", UserType::Developer);

        assert_eq!(user.name(), "Ada");
        assert_eq!(user.email(), "ada@example.com");
        assert!(user.is_developer());
        assert!(user.bio().is_none());
    }

    #[test]
    fn test_user_type_developer_capability() {
        assert!(UserType::Developer.is_developer());
        assert!(UserType::Both.is_developer());
        assert!(!UserType::Consumer.is_developer());
    }

    #[test]
    fn test_user_type_parse() {
        assert_eq!("both".parse::<UserType>().unwrap(), UserType::Both);
        assert!("admin".parse::<UserType>().is_err());
    }

    #[test]
    fn test_user_id_parse() {
        let id = UserId::generate();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        let err = "not-a-uuid".parse::<UserId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId { .. }));
    }

    #[test]
    fn test_set_bio_touches_updated_at() {
        let mut user = User::new("Ada", "ada@example.com", "hash", UserType::Consumer);
        let before = user.updated_at();

        user.set_bio(Some("Builds models".to_string()));

        assert_eq!(user.bio(), Some("Builds models"));
        assert!(user.updated_at() >= before);
    }
}
