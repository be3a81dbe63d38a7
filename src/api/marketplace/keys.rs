//! API key ledger endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyStatus};
use crate::domain::model::{AiModel, ModelId};
use crate::infrastructure::api_key::{KeyDetails, KeyHolder, OwnedKey};

use super::users::OwnerSummary;

#[derive(Debug, Clone, Deserialize)]
pub struct IssueKeyRequest {
    pub model_id: String,
}

/// Key metadata; the secret is only ever returned by issue
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: String,
    pub user_id: String,
    pub model_id: String,
    pub key_prefix: String,
    pub usage_count: u64,
    pub status: ApiKeyStatus,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().to_string(),
            user_id: key.user_id().to_string(),
            model_id: key.model_id().to_string(),
            key_prefix: key.key_prefix().to_string(),
            usage_count: key.usage_count(),
            status: key.status(),
            created_at: key.created_at(),
            revoked_at: key.revoked_at(),
        }
    }
}

/// The listing fields of the model a key unlocks
#[derive(Debug, Clone, Serialize)]
pub struct KeyModelSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
}

impl From<&AiModel> for KeyModelSummary {
    fn from(model: &AiModel) -> Self {
        Self {
            id: model.id().to_string(),
            name: model.name().to_string(),
            description: model.description().to_string(),
            category: model.category().map(String::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnedKeyResponse {
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
    pub model: Option<KeyModelSummary>,
}

impl From<&OwnedKey> for OwnedKeyResponse {
    fn from(owned: &OwnedKey) -> Self {
        Self {
            api_key: ApiKeyResponse::from(&owned.api_key),
            model: owned.model.as_ref().map(KeyModelSummary::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyDetailsResponse {
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
    pub model: Option<KeyModelSummary>,
    pub owner: Option<OwnerSummary>,
}

impl From<&KeyDetails> for KeyDetailsResponse {
    fn from(details: &KeyDetails) -> Self {
        Self {
            api_key: ApiKeyResponse::from(&details.api_key),
            model: details.model.as_ref().map(KeyModelSummary::from),
            owner: details.owner.as_ref().map(OwnerSummary::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyDetailsEnvelope {
    pub api_key: KeyDetailsResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyHolderResponse {
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
    pub owner: Option<OwnerSummary>,
}

impl From<&KeyHolder> for KeyHolderResponse {
    fn from(holder: &KeyHolder) -> Self {
        Self {
            api_key: ApiKeyResponse::from(&holder.api_key),
            owner: holder.owner.as_ref().map(OwnerSummary::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedKeyResponse {
    pub message: String,
    pub api_key: ApiKeyResponse,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub api_key: ApiKeyResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyListResponse<T> {
    pub api_keys: Vec<T>,
}

/// POST /api/keys
pub async fn issue_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<IssueKeyRequest>,
) -> Result<(StatusCode, Json<IssuedKeyResponse>), ApiError> {
    let model_id: ModelId = request.model_id.parse()?;
    let issued = state.api_key_service.issue(user.id(), &model_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(IssuedKeyResponse {
            message: "API key generated successfully".to_string(),
            api_key: ApiKeyResponse::from(&issued.api_key),
            secret: issued.secret,
        }),
    ))
}

/// GET /api/keys/my-keys
pub async fn list_my_keys(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ApiKeyListResponse<OwnedKeyResponse>>, ApiError> {
    let keys = state.api_key_service.list_by_owner(user.id()).await?;

    Ok(Json(ApiKeyListResponse {
        api_keys: keys.iter().map(OwnedKeyResponse::from).collect(),
    }))
}

/// GET /api/keys/{key_id}
pub async fn get_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(key_id): Path<String>,
) -> Result<Json<KeyDetailsEnvelope>, ApiError> {
    let key_id: ApiKeyId = key_id.parse()?;
    let details = state.api_key_service.get(&key_id, &user).await?;

    Ok(Json(KeyDetailsEnvelope {
        api_key: KeyDetailsResponse::from(&details),
    }))
}

/// PATCH /api/keys/{key_id}/revoke
pub async fn revoke_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(key_id): Path<String>,
) -> Result<Json<ApiKeyEnvelope>, ApiError> {
    let key_id: ApiKeyId = key_id.parse()?;
    let key = state.api_key_service.revoke(&key_id, user.id()).await?;

    Ok(Json(ApiKeyEnvelope {
        message: Some("API key revoked successfully".to_string()),
        api_key: ApiKeyResponse::from(&key),
    }))
}

/// GET /api/keys/model/{model_id}
pub async fn list_model_keys(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(model_id): Path<String>,
) -> Result<Json<ApiKeyListResponse<KeyHolderResponse>>, ApiError> {
    let model_id: ModelId = model_id.parse()?;
    let holders = state
        .api_key_service
        .list_by_model(&model_id, user.id())
        .await?;

    Ok(Json(ApiKeyListResponse {
        api_keys: holders.iter().map(KeyHolderResponse::from).collect(),
    }))
}
