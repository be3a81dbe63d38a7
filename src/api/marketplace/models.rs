//! Model catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::middleware::{OptionalUser, RequireUser};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, Query, ValidJson};
use crate::domain::model::{AiModel, ModelDraft, ModelId, ModelStatus, PricingType};
use crate::domain::user::UserId;
use crate::infrastructure::model::{ModelFilter, ModelListing, ModelUpdate};

use super::users::OwnerSummary;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateModelRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    #[serde(default = "default_pricing_type")]
    pub pricing_type: PricingType,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price_per_call: f64,
    #[serde(default)]
    pub usage_limit_free: u32,
    #[serde(default)]
    pub model_file_url: String,
}

fn default_pricing_type() -> PricingType {
    PricingType::Free
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateModelRequest {
    #[validate(length(min = 1, max = 100, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub pricing_type: Option<PricingType>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price_per_call: Option<f64>,
    pub usage_limit_free: Option<u32>,
    pub model_file_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListModelsQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub developer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelResponse {
    pub id: String,
    pub developer_id: String,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub pricing_type: PricingType,
    pub price_per_call: f64,
    pub usage_limit_free: u32,
    pub api_endpoint: String,
    pub model_file_url: String,
    pub status: ModelStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AiModel> for ModelResponse {
    fn from(model: &AiModel) -> Self {
        Self {
            id: model.id().to_string(),
            developer_id: model.developer_id().to_string(),
            name: model.name().to_string(),
            description: model.description().to_string(),
            category: model.category().map(String::from),
            pricing_type: model.pricing_type(),
            price_per_call: model.price_per_call(),
            usage_limit_free: model.usage_limit_free(),
            api_endpoint: model.api_endpoint().to_string(),
            model_file_url: model.model_file_url().to_string(),
            status: model.status(),
            created_at: model.created_at(),
            updated_at: model.updated_at(),
        }
    }
}

/// A model with its developer's name and email
#[derive(Debug, Clone, Serialize)]
pub struct ModelListingResponse {
    #[serde(flatten)]
    pub model: ModelResponse,
    pub developer: Option<OwnerSummary>,
}

impl From<&ModelListing> for ModelListingResponse {
    fn from(listing: &ModelListing) -> Self {
        Self {
            model: ModelResponse::from(&listing.model),
            developer: listing.developer.as_ref().map(OwnerSummary::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelListingEnvelope {
    pub model: ModelListingResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListModelListingsResponse {
    pub models: Vec<ModelListingResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub model: ModelResponse,
}

impl ModelEnvelope {
    fn with_message(message: &str, model: &AiModel) -> Self {
        Self {
            message: Some(message.to_string()),
            model: ModelResponse::from(model),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListModelsResponse {
    pub models: Vec<ModelResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn to_list(models: &[AiModel]) -> ListModelsResponse {
    ListModelsResponse {
        models: models.iter().map(ModelResponse::from).collect(),
    }
}

/// GET /api/models
pub async fn list_models(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<ListModelsQuery>,
) -> Result<Json<ListModelListingsResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ModelStatus>)
        .transpose()?;
    let developer_id = query
        .developer_id
        .as_deref()
        .map(str::parse::<UserId>)
        .transpose()?;

    let filter = ModelFilter {
        category: query.category,
        status,
        developer_id,
    };
    let listings = state.model_service.list(&filter, user.as_ref()).await?;

    Ok(Json(ListModelListingsResponse {
        models: listings.iter().map(ModelListingResponse::from).collect(),
    }))
}

/// GET /api/models/developer/my-models
pub async fn list_my_models(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ListModelsResponse>, ApiError> {
    let models = state.model_service.list_by_developer(user.id()).await?;

    Ok(Json(to_list(&models)))
}

/// GET /api/models/{model_id}
pub async fn get_model(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(model_id): Path<String>,
) -> Result<Json<ModelListingEnvelope>, ApiError> {
    let model_id: ModelId = model_id.parse()?;
    let listing = state
        .model_service
        .get_listing(&model_id, user.as_ref().map(|u| u.id()))
        .await?;

    Ok(Json(ModelListingEnvelope {
        model: ModelListingResponse::from(&listing),
    }))
}

/// POST /api/models
pub async fn create_model(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ValidJson(request): ValidJson<CreateModelRequest>,
) -> Result<(StatusCode, Json<ModelEnvelope>), ApiError> {
    let draft = ModelDraft {
        name: request.name,
        description: request.description,
        category: request.category,
        pricing_type: request.pricing_type,
        price_per_call: request.price_per_call,
        usage_limit_free: request.usage_limit_free,
        model_file_url: request.model_file_url,
    };
    let model = state.model_service.create(&user, draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(ModelEnvelope::with_message("Model created successfully", &model)),
    ))
}

/// PUT /api/models/{model_id}
pub async fn update_model(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(model_id): Path<String>,
    ValidJson(request): ValidJson<UpdateModelRequest>,
) -> Result<Json<ModelEnvelope>, ApiError> {
    let model_id: ModelId = model_id.parse()?;
    let update = ModelUpdate {
        name: request.name,
        description: request.description,
        category: request.category,
        pricing_type: request.pricing_type,
        price_per_call: request.price_per_call,
        usage_limit_free: request.usage_limit_free,
        model_file_url: request.model_file_url,
    };
    let model = state
        .model_service
        .update(&model_id, user.id(), update)
        .await?;

    Ok(Json(ModelEnvelope::with_message("Model updated successfully", &model)))
}

/// PATCH /api/models/{model_id}/status
pub async fn change_model_status(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(model_id): Path<String>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<Json<ModelEnvelope>, ApiError> {
    let model_id: ModelId = model_id.parse()?;
    let model = state
        .model_service
        .change_status(&model_id, user.id(), &request.status)
        .await?;

    Ok(Json(ModelEnvelope::with_message(
        "Model status updated successfully",
        &model,
    )))
}

/// DELETE /api/models/{model_id}
pub async fn delete_model(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(model_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let model_id: ModelId = model_id.parse()?;
    state.model_service.delete(&model_id, user.id()).await?;

    Ok(Json(MessageResponse {
        message: "Model deleted successfully".to_string(),
    }))
}
