//! API key ledger service
//!
//! Issues, verifies, revokes and lists per-model keys. Existence and
//! authorization checks always run before any mutation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::model::{AiModel, ModelId, ModelRepository};
use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_key_verification;
use crate::infrastructure::storage::StorageDeadline;

use super::generator::{has_secret_shape, hash_secret, SecretGenerator};

/// A newly issued key together with its one-time plaintext secret
#[derive(Debug, Clone)]
pub struct IssuedApiKey {
    pub api_key: ApiKey,
    pub secret: String,
}

/// A key joined with the model it unlocks
#[derive(Debug, Clone)]
pub struct OwnedKey {
    pub api_key: ApiKey,
    /// None when the model has been deleted
    pub model: Option<AiModel>,
}

/// A key joined with both its model and its owner
#[derive(Debug, Clone)]
pub struct KeyDetails {
    pub api_key: ApiKey,
    pub model: Option<AiModel>,
    pub owner: Option<User>,
}

/// A model's key joined with the account holding it
#[derive(Debug, Clone)]
pub struct KeyHolder {
    pub api_key: ApiKey,
    /// None when the owning account no longer exists
    pub owner: Option<User>,
}

#[derive(Debug)]
pub struct ApiKeyService {
    keys: Arc<dyn ApiKeyRepository>,
    models: Arc<dyn ModelRepository>,
    users: Arc<dyn UserRepository>,
    generator: SecretGenerator,
    deadline: StorageDeadline,
}

impl ApiKeyService {
    pub fn new(
        keys: Arc<dyn ApiKeyRepository>,
        models: Arc<dyn ModelRepository>,
        users: Arc<dyn UserRepository>,
        deadline: StorageDeadline,
    ) -> Self {
        Self {
            keys,
            models,
            users,
            generator: SecretGenerator::new(),
            deadline,
        }
    }

    async fn require_model(&self, model_id: &ModelId) -> Result<AiModel, DomainError> {
        self.deadline
            .run("models.get", self.models.get(model_id))
            .await?
            .ok_or_else(|| DomainError::not_found("AI model not found"))
    }

    async fn require_key(&self, key_id: &ApiKeyId) -> Result<ApiKey, DomainError> {
        self.deadline
            .run("api_keys.get", self.keys.get(key_id))
            .await?
            .ok_or_else(|| DomainError::not_found("API key not found"))
    }

    /// Issue a key for `user_id` against an active model
    pub async fn issue(&self, user_id: &UserId, model_id: &ModelId) -> Result<IssuedApiKey, DomainError> {
        let model = self.require_model(model_id).await?;

        if !model.is_active() {
            return Err(DomainError::invalid_state(
                "Cannot generate API key for inactive model",
            ));
        }

        let existing = self
            .deadline
            .run("api_keys.find_active", self.keys.find_active(user_id, model_id))
            .await?;
        if existing.is_some() {
            return Err(DomainError::conflict(
                "You already have an active API key for this model",
            ));
        }

        let generated = self.generator.generate();
        let api_key = ApiKey::new(*user_id, *model_id, generated.display_prefix, generated.hash);

        // A racing issue for the same pair is rejected by the repository itself
        let api_key = self
            .deadline
            .run("api_keys.create", self.keys.create(api_key))
            .await?;

        info!(
            api_key_id = %api_key.id(),
            user_id = %user_id,
            model_id = %model_id,
            "Issued API key"
        );

        Ok(IssuedApiKey {
            api_key,
            secret: generated.secret,
        })
    }

    /// Check a presented secret against the target model and count the call
    pub async fn verify(&self, secret: &str, model_id: &ModelId) -> Result<ApiKey, DomainError> {
        let outcome = self.verify_inner(secret, model_id).await;

        let label = match &outcome {
            Ok(_) => "valid",
            Err(DomainError::InvalidKey { .. }) => "invalid",
            Err(DomainError::KeyMismatch { .. }) => "mismatch",
            Err(_) => "error",
        };
        record_key_verification(label);

        outcome
    }

    async fn verify_inner(&self, secret: &str, model_id: &ModelId) -> Result<ApiKey, DomainError> {
        let invalid = || DomainError::invalid_key("Invalid or revoked API key");

        if !has_secret_shape(secret) {
            debug!("Rejected malformed API key");
            return Err(invalid());
        }

        let key = self
            .deadline
            .run(
                "api_keys.find_active_by_hash",
                self.keys.find_active_by_hash(&hash_secret(secret)),
            )
            .await?
            .ok_or_else(invalid)?;

        if key.model_id() != model_id {
            warn!(
                api_key_id = %key.id(),
                requested_model = %model_id,
                "API key presented for another model"
            );
            return Err(DomainError::key_mismatch("API key not valid for this model"));
        }

        // None here means the key was revoked after the lookup
        let key = self
            .deadline
            .run("api_keys.increment_usage", self.keys.increment_usage(key.id()))
            .await?
            .ok_or_else(invalid)?;

        debug!(api_key_id = %key.id(), usage_count = key.usage_count(), "Verified API key");
        Ok(key)
    }

    /// Revoke a key; repeating the call is a no-op that returns the key
    pub async fn revoke(&self, key_id: &ApiKeyId, requester: &UserId) -> Result<ApiKey, DomainError> {
        let key = self.require_key(key_id).await?;

        if !key.is_owned_by(requester) {
            warn!(api_key_id = %key_id, user_id = %requester, "Rejected revoke by non-owner");
            return Err(DomainError::forbidden("Access denied"));
        }

        if !key.is_active() {
            return Ok(key);
        }

        let key = self
            .deadline
            .run("api_keys.revoke", self.keys.revoke(key_id))
            .await?
            .ok_or_else(|| DomainError::not_found("API key not found"))?;

        info!(api_key_id = %key_id, "Revoked API key");
        Ok(key)
    }

    /// Fetch one key with its model and owner; visible to its owner and to developers
    pub async fn get(&self, key_id: &ApiKeyId, requester: &User) -> Result<KeyDetails, DomainError> {
        let api_key = self.require_key(key_id).await?;

        if !api_key.is_owned_by(requester.id()) && !requester.is_developer() {
            warn!(api_key_id = %key_id, user_id = %requester.id(), "Rejected key read");
            return Err(DomainError::forbidden("Access denied"));
        }

        let model = self
            .deadline
            .run("models.get", self.models.get(api_key.model_id()))
            .await?;
        let owner = self
            .deadline
            .run("users.get", self.users.get(api_key.user_id()))
            .await?;

        Ok(KeyDetails {
            api_key,
            model,
            owner,
        })
    }

    /// Keys held by a user with the models they unlock, newest first
    pub async fn list_by_owner(&self, user_id: &UserId) -> Result<Vec<OwnedKey>, DomainError> {
        let keys = self
            .deadline
            .run("api_keys.list_by_user", self.keys.list_by_user(user_id))
            .await?;

        let mut models: HashMap<ModelId, Option<AiModel>> = HashMap::new();
        let mut owned = Vec::with_capacity(keys.len());

        for api_key in keys {
            let model_id = *api_key.model_id();
            if !models.contains_key(&model_id) {
                let model = self
                    .deadline
                    .run("models.get", self.models.get(&model_id))
                    .await?;
                models.insert(model_id, model);
            }

            owned.push(OwnedKey {
                model: models.get(&model_id).cloned().flatten(),
                api_key,
            });
        }

        Ok(owned)
    }

    /// Keys issued against a model, visible to the model's developer only
    pub async fn list_by_model(
        &self,
        model_id: &ModelId,
        requester: &UserId,
    ) -> Result<Vec<KeyHolder>, DomainError> {
        let model = self.require_model(model_id).await?;

        if !model.is_owned_by(requester) {
            warn!(model_id = %model_id, user_id = %requester, "Rejected key listing by non-owner");
            return Err(DomainError::forbidden("Access denied"));
        }

        let keys = self
            .deadline
            .run("api_keys.list_by_model", self.keys.list_by_model(model_id))
            .await?;

        let mut owners: HashMap<UserId, Option<User>> = HashMap::new();
        let mut holders = Vec::with_capacity(keys.len());

        for api_key in keys {
            let owner_id = *api_key.user_id();
            if !owners.contains_key(&owner_id) {
                let owner = self
                    .deadline
                    .run("users.get", self.users.get(&owner_id))
                    .await?;
                owners.insert(owner_id, owner);
            }

            holders.push(KeyHolder {
                owner: owners.get(&owner_id).cloned().flatten(),
                api_key,
            });
        }

        Ok(holders)
    }
}
