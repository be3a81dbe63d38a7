//! Marketplace REST API mounted under `/api`

pub mod keys;
pub mod models;
pub mod usage;
pub mod users;

use axum::{
    routing::{get, patch, post},
    Router,
};

use super::state::AppState;

pub fn create_marketplace_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route(
            "/users/profile",
            get(users::get_profile).put(users::update_profile),
        )
        // Model catalog
        .route("/models", get(models::list_models).post(models::create_model))
        .route("/models/developer/my-models", get(models::list_my_models))
        .route(
            "/models/{model_id}",
            get(models::get_model)
                .put(models::update_model)
                .delete(models::delete_model),
        )
        .route("/models/{model_id}/status", patch(models::change_model_status))
        // Key ledger
        .route("/keys", post(keys::issue_key))
        .route("/keys/my-keys", get(keys::list_my_keys))
        .route("/keys/model/{model_id}", get(keys::list_model_keys))
        .route("/keys/{key_id}", get(keys::get_key))
        .route("/keys/{key_id}/revoke", patch(keys::revoke_key))
        // Metering and usage
        .route("/usage/calls", post(usage::record_call))
        .route("/usage/key/{key_id}", get(usage::list_key_usage))
        .route("/usage/model/{model_id}", get(usage::list_model_usage))
        .route("/usage/my-usage", get(usage::list_my_usage))
        .route("/usage/developer/stats", get(usage::developer_stats))
}
