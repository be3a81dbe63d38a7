//! Account endpoints

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, ValidJson};
use crate::domain::user::{User, UserType};
use crate::infrastructure::user::{AuthSession, ProfileUpdate, RegisterUser};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub user_type: UserType,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Bio is too long"))]
    pub bio: Option<String>,
}

/// Public view of an account; never carries the password hash
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            name: user.name().to_string(),
            email: user.email().to_string(),
            user_type: user.user_type(),
            bio: user.bio().map(String::from),
            created_at: user.created_at(),
        }
    }
}

/// Name and email of an account joined onto another resource
#[derive(Debug, Clone, Serialize)]
pub struct OwnerSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for OwnerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            name: user.name().to_string(),
            email: user.email().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

impl AuthResponse {
    fn new(message: &str, session: AuthSession) -> Self {
        Self {
            message: message.to_string(),
            token: session.token,
            user: UserResponse::from(&session.user),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
}

/// POST /api/users/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let session = state
        .user_service
        .register(RegisterUser {
            name: request.name,
            email: request.email,
            password: request.password,
            user_type: request.user_type,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new("User registered successfully", session)),
    ))
}

/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let session = state
        .user_service
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(AuthResponse::new("Login successful", session)))
}

/// GET /api/users/profile
pub async fn get_profile(RequireUser(user): RequireUser) -> Json<ProfileResponse> {
    debug!(user_id = %user.id(), "Fetching profile");

    Json(ProfileResponse {
        user: UserResponse::from(&user),
    })
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ValidJson(request): ValidJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .user_service
        .update_profile(
            user.id(),
            ProfileUpdate {
                name: request.name,
                bio: request.bio,
            },
        )
        .await?;

    Ok(Json(ProfileResponse {
        user: UserResponse::from(&user),
    }))
}
