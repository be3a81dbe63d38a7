//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::api_key::ApiKeyService;
use crate::infrastructure::auth::JwtGenerator;
use crate::infrastructure::model::ModelService;
use crate::infrastructure::usage::UsageService;
use crate::infrastructure::user::UserService;

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub model_service: Arc<ModelService>,
    pub api_key_service: Arc<ApiKeyService>,
    pub usage_service: Arc<UsageService>,
    pub jwt_service: Arc<dyn JwtGenerator>,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        model_service: Arc<ModelService>,
        api_key_service: Arc<ApiKeyService>,
        usage_service: Arc<UsageService>,
        jwt_service: Arc<dyn JwtGenerator>,
    ) -> Self {
        Self {
            user_service,
            model_service,
            api_key_service,
            usage_service,
            jwt_service,
        }
    }
}
