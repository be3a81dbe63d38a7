//! API Key entity and related types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::model::ModelId;
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Opaque API key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
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

impl FromStr for ApiKeyId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DomainError::invalid_id(format!("Invalid API key id '{}'", s)))
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of an API key; revocation is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    /// Key is active and can be used
    #[default]
    Active,
    /// Key has been revoked and cannot be used
    Revoked,
}

impl ApiKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for ApiKeyStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            other => Err(DomainError::storage(format!(
                "Unknown API key status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ApiKeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key granting one user access to one model
///
/// The plaintext secret is never stored; only its hash and a short display
/// prefix are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    id: ApiKeyId,
    user_id: UserId,
    model_id: ModelId,
    key_prefix: String,
    secret_hash: String,
    usage_count: u64,
    status: ApiKeyStatus,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Create a fresh active key with a zero usage counter
    pub fn new(
        user_id: UserId,
        model_id: ModelId,
        key_prefix: impl Into<String>,
        secret_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: ApiKeyId::generate(),
            user_id,
            model_id,
            key_prefix: key_prefix.into(),
            secret_hash: secret_hash.into(),
            usage_count: 0,
            status: ApiKeyStatus::Active,
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    /// Rebuild a key from persisted columns
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ApiKeyId,
        user_id: UserId,
        model_id: ModelId,
        key_prefix: String,
        secret_hash: String,
        usage_count: u64,
        status: ApiKeyStatus,
        created_at: DateTime<Utc>,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            model_id,
            key_prefix,
            secret_hash,
            usage_count,
            status,
            created_at,
            revoked_at,
        }
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    pub fn status(&self) -> ApiKeyStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn is_active(&self) -> bool {
        self.status == ApiKeyStatus::Active
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    // Mutators

    /// Revoke the key; returns false when it was already revoked
    pub fn revoke(&mut self) -> bool {
        if self.status == ApiKeyStatus::Revoked {
            return false;
        }

        self.status = ApiKeyStatus::Revoked;
        self.revoked_at = Some(Utc::now());
        true
    }

    /// Count one successful call
    pub fn record_usage(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ApiKey {
        ApiKey::new(
            UserId::generate(),
            ModelId::generate(),
            "mk_live_abcdefgh",
            "sha256$hash",
        )
    }

    #[test]
    fn test_new_key_is_active_and_unused() {
        let key = key();

        assert!(key.is_active());
        assert_eq!(key.usage_count(), 0);
        assert!(key.revoked_at().is_none());
    }

    #[test]
    fn test_revoke_is_one_way_and_idempotent() {
        let mut key = key();

        assert!(key.revoke());
        let revoked_at = key.revoked_at();
        assert!(revoked_at.is_some());

        assert!(!key.revoke());
        assert_eq!(key.status(), ApiKeyStatus::Revoked);
        assert_eq!(key.revoked_at(), revoked_at);
    }

    #[test]
    fn test_record_usage() {
        let mut key = key();
        key.record_usage();
        key.record_usage();

        assert_eq!(key.usage_count(), 2);
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [ApiKeyStatus::Active, ApiKeyStatus::Revoked] {
            assert_eq!(status.as_str().parse::<ApiKeyStatus>().unwrap(), status);
        }
        assert!("expired".parse::<ApiKeyStatus>().is_err());
    }
}
